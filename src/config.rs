//! Runtime configuration utilities for patent-harvest.

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;

/// Application configuration resolved from `.env` and defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Root folder for the search history and other state.
    pub data_dir: PathBuf,
    /// Root folder for consolidated patent files and pipeline logs.
    pub outputs_dir: PathBuf,
    /// Default tracing directive when `RUST_LOG` is unset.
    pub log_level: String,
    /// Per-request timeout for upstream HTTP calls.
    pub http_timeout_secs: u64,
    /// Pause between consecutive upstream calls.
    pub request_delay_ms: u64,
    pub pubchem_base_url: String,
    pub google_patents_base_url: String,
    pub drugbank_base_url: String,
    /// OAuth bearer token for the Sheets API; export is disabled without it.
    pub sheets_token: Option<String>,
    /// History entries older than this are removed on cleanup.
    pub history_retention_days: i64,
}

impl Settings {
    /// Load configuration from environment with reasonable defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let outputs_dir = env::var("OUTPUTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./output"));
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let http_timeout_secs = parse_var("HTTP_TIMEOUT_SECS").unwrap_or(30);
        let request_delay_ms = parse_var("REQUEST_DELAY_MS").unwrap_or(250);
        let pubchem_base_url = base_url_var("PUBCHEM_BASE_URL", "https://pubchem.ncbi.nlm.nih.gov");
        let google_patents_base_url =
            base_url_var("GOOGLE_PATENTS_BASE_URL", "https://patents.google.com");
        let drugbank_base_url = base_url_var("DRUGBANK_BASE_URL", "https://go.drugbank.com");
        let sheets_token = env::var("GOOGLE_SHEETS_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        let history_retention_days = parse_var("HISTORY_RETENTION_DAYS").unwrap_or(90);

        let settings = Self {
            data_dir,
            outputs_dir,
            log_level,
            http_timeout_secs,
            request_delay_ms,
            pubchem_base_url,
            google_patents_base_url,
            drugbank_base_url,
            sheets_token,
            history_retention_days,
        };
        settings.ensure_dirs()?;
        Ok(settings)
    }

    /// Settings rooted at `root`, with upstream URLs left at their defaults.
    /// Used by tests and embedding callers that do not read the environment.
    pub fn with_root<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref();
        let settings = Self {
            data_dir: root.join("data"),
            outputs_dir: root.join("output"),
            log_level: "info".to_string(),
            http_timeout_secs: 30,
            request_delay_ms: 0,
            pubchem_base_url: "https://pubchem.ncbi.nlm.nih.gov".to_string(),
            google_patents_base_url: "https://patents.google.com".to_string(),
            drugbank_base_url: "https://go.drugbank.com".to_string(),
            sheets_token: None,
            history_retention_days: 90,
        };
        settings.ensure_dirs()?;
        Ok(settings)
    }

    fn ensure_dirs(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir).context("creating data dir")?;
        std::fs::create_dir_all(&self.outputs_dir).context("creating outputs dir")?;
        Ok(())
    }

    /// Convenience helper for derived path segments.
    pub fn join_data<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.data_dir.join(path)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn base_url_var(key: &str, default: &str) -> String {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim_end_matches('/')
        .to_string()
}
