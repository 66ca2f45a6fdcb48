//! Output sinks: consolidated files on disk and optional spreadsheet export.

pub mod files;
pub mod sheets;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    patents::{PatentMetadata, SourceKind},
    pipeline::{ConsolidatedResult, RunConfiguration, RunStage},
};

pub use files::FileSink;
pub use sheets::SheetsExporter;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("export failed: {0}")]
    Export(String),
}

/// Facts about a run that accompany its records in persisted output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub search_key: String,
    pub source_kind: SourceKind,
    pub display_name: String,
    pub target_countries: Vec<String>,
    pub max_family_per_country: usize,
    pub max_seed_records: Option<usize>,
    pub enrich_secondary: bool,
    pub status: RunStage,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tool_version: String,
}

impl RunMetadata {
    pub fn new(
        config: &RunConfiguration,
        result: &ConsolidatedResult,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            search_key: config.search_key.clone(),
            source_kind: config.source_kind,
            display_name: result
                .display_name
                .clone()
                .unwrap_or_else(|| config.search_key.clone()),
            target_countries: config.target_countries.clone(),
            max_family_per_country: config.max_family_per_country,
            max_seed_records: config.max_seed_records,
            enrich_secondary: config.enrich_secondary,
            status: result.status,
            started_at,
            finished_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Durable storage for a consolidated result.
pub trait OutputSink: Send + Sync {
    /// Persist `result`, returning where the primary artefact was written.
    fn persist(
        &self,
        result: &ConsolidatedResult,
        run: &RunMetadata,
    ) -> Result<PathBuf, OutputError>;
}

/// Where an external export landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportHandle {
    pub url: String,
    pub export_id: String,
}

/// Publishes a result to a shared external service.
#[async_trait]
pub trait ExternalExporter: Send + Sync {
    /// `Ok(None)` when the exporter is not configured.
    async fn export_external(
        &self,
        result: &ConsolidatedResult,
        display_name: &str,
    ) -> Result<Option<ExportHandle>, OutputError>;
}

/// Column order shared by the CSV file and the spreadsheet export.
pub const RECORD_COLUMNS: &[&str] = &[
    "identifier",
    "provenance",
    "title",
    "country",
    "priority_date",
    "filing_date",
    "publication_date",
    "inventors_primary",
    "inventors_secondary",
    "assignees_primary",
    "assignees_secondary",
    "abstract_primary",
    "abstract_secondary",
    "claims",
    "family_members",
    "google_patents_url",
    "pubchem_url",
    "error",
];

/// Flatten a record into `RECORD_COLUMNS` order. Lists are joined with `; `;
/// absent claims render as an empty cell, claims as a numbered block.
pub fn record_row(record: &PatentMetadata) -> Vec<String> {
    vec![
        record.identifier.clone(),
        record.provenance.to_string(),
        record.title.clone(),
        record.country.clone(),
        record.priority_date.clone(),
        record.filing_date.clone(),
        record.publication_date.clone(),
        record.inventors_primary.join("; "),
        record.inventors_secondary.join("; "),
        record.assignees_primary.join("; "),
        record.assignees_secondary.join("; "),
        record.abstract_primary.clone(),
        record.abstract_secondary.clone(),
        record
            .claims
            .as_ref()
            .map(|claims| claims.join("\n"))
            .unwrap_or_default(),
        record.family_members.join("; "),
        record.urls.google_patents.clone(),
        record.urls.pubchem.clone(),
        record.error.clone().unwrap_or_default(),
    ]
}

/// File-name-safe form of a search key.
pub fn file_stem(search_key: &str) -> String {
    let stem: String = search_key
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "search".to_string()
    } else {
        stem
    }
}
