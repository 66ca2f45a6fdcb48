//! One complete search: run the pipeline against the live backends, persist
//! the result, optionally export it and record it in the history.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    config::Settings,
    history::{HistoryEntry, HistoryStore, NewHistoryEntry},
    output::{ExportHandle, ExternalExporter, FileSink, OutputSink, RunMetadata, SheetsExporter},
    patents::SourceKind,
    pipeline::{
        config::DEFAULT_MAX_FAMILY_PER_COUNTRY, ConsolidatedResult, Pipeline, PipelineError,
        ProgressSink, RunConfiguration,
    },
    sources::{fetcher_for, google_patents::GooglePatentsEnricher, pubchem::PubchemExtractor},
};

/// A search request as accepted by the CLI and the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRequest {
    #[serde(default = "default_source")]
    pub source: SourceKind,
    /// Compound keyword; required for PubChem.
    #[serde(default)]
    pub keyword: Option<String>,
    /// Accession; required for DrugBank.
    #[serde(default)]
    pub drugbank_id: Option<String>,
    #[serde(default = "default_countries")]
    pub countries: Vec<String>,
    #[serde(default = "default_max_families")]
    pub max_families: usize,
    #[serde(default)]
    pub max_seeds: Option<usize>,
    #[serde(default = "default_true")]
    pub enrich: bool,
    #[serde(default)]
    pub export_sheets: bool,
}

fn default_source() -> SourceKind {
    SourceKind::Pubchem
}

fn default_countries() -> Vec<String> {
    vec!["US".to_string()]
}

fn default_max_families() -> usize {
    DEFAULT_MAX_FAMILY_PER_COUNTRY
}

fn default_true() -> bool {
    true
}

impl PipelineRequest {
    pub fn new(source: SourceKind, key: impl Into<String>) -> Self {
        let key = key.into();
        let (keyword, drugbank_id) = match source {
            SourceKind::Pubchem => (Some(key), None),
            SourceKind::Drugbank => (None, Some(key)),
        };
        Self {
            source,
            keyword,
            drugbank_id,
            countries: default_countries(),
            max_families: default_max_families(),
            max_seeds: None,
            enrich: true,
            export_sheets: false,
        }
    }

    /// The key matching `source`, trimmed; empty when missing.
    pub fn search_key(&self) -> String {
        let key = match self.source {
            SourceKind::Pubchem => self.keyword.as_deref(),
            SourceKind::Drugbank => self.drugbank_id.as_deref(),
        };
        key.unwrap_or_default().trim().to_string()
    }

    pub fn run_config(&self) -> Result<RunConfiguration, PipelineError> {
        let config = RunConfiguration::new(self.search_key(), self.source)
            .with_countries(&self.countries)
            .with_max_family(self.max_families)
            .with_max_seeds(self.max_seeds)
            .with_enrichment(self.enrich);
        config.validate()?;
        Ok(config)
    }
}

/// What a finished job produced.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub result: ConsolidatedResult,
    pub output_path: PathBuf,
    pub export: Option<ExportHandle>,
    pub history: Option<HistoryEntry>,
}

/// Run the whole search for `request` against the live upstreams.
///
/// On a backend loss the partial result is still written to disk before the
/// error is returned.
#[instrument(skip(settings, progress), fields(source = %request.source))]
pub async fn execute(
    settings: &Settings,
    request: &PipelineRequest,
    progress: &dyn ProgressSink,
) -> Result<JobOutcome> {
    let config = request.run_config()?;
    let started_at = Utc::now();

    let fetcher = fetcher_for(config.source_kind, settings)?;
    let extractor = PubchemExtractor::new(settings)?;
    let enricher = GooglePatentsEnricher::new(settings);
    let pipeline = Pipeline::new(fetcher.as_ref(), &extractor, &enricher, progress);

    let sink = FileSink::from_settings(settings);
    let result = match pipeline.run(&config).await {
        Ok(result) => result,
        Err(err) => {
            if let Some(partial) = err.partial_result() {
                let run = RunMetadata::new(&config, partial, started_at);
                match persist(sink, partial.clone(), run).await {
                    Ok(path) => warn!(path = %path.display(), "saved partial result"),
                    Err(save_err) => {
                        warn!(error = %format!("{save_err:#}"), "could not save partial result")
                    }
                }
            }
            return Err(err).context("patent pipeline failed");
        }
    };

    let run = RunMetadata::new(&config, &result, started_at);
    let output_path = persist(sink, result.clone(), run.clone()).await?;

    let export = if request.export_sheets {
        export_sheets(settings, &result, &run.display_name).await
    } else {
        None
    };

    let history = record_history(
        settings.clone(),
        config,
        run,
        output_path.clone(),
        export.clone(),
    )
    .await;

    info!(
        path = %output_path.display(),
        total = result.summary.total,
        exported = export.is_some(),
        "search finished"
    );
    Ok(JobOutcome {
        result,
        output_path,
        export,
        history,
    })
}

/// Export failures never fail the job.
async fn export_sheets(
    settings: &Settings,
    result: &ConsolidatedResult,
    display_name: &str,
) -> Option<ExportHandle> {
    let exporter = match SheetsExporter::new(settings) {
        Ok(exporter) => exporter,
        Err(err) => {
            warn!(%err, "sheets exporter unavailable");
            return None;
        }
    };
    if !exporter.is_configured() {
        warn!("GOOGLE_SHEETS_TOKEN not set; skipping sheets export");
        return None;
    }
    match exporter.export_external(result, display_name).await {
        Ok(handle) => handle,
        Err(err) => {
            warn!(%err, "sheets export failed");
            None
        }
    }
}

/// File writes run on the blocking pool.
async fn persist(
    sink: FileSink,
    result: ConsolidatedResult,
    run: RunMetadata,
) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || sink.persist(&result, &run))
        .await
        .context("output writer task failed")?
        .context("saving pipeline output")
}

/// History failures are logged; the search itself already succeeded.
async fn record_history(
    settings: Settings,
    config: RunConfiguration,
    run: RunMetadata,
    output_path: PathBuf,
    export: Option<ExportHandle>,
) -> Option<HistoryEntry> {
    let entry = NewHistoryEntry {
        search_key: config.search_key,
        source_kind: config.source_kind,
        display_name: Some(run.display_name),
        export_url: export.as_ref().map(|e| e.url.clone()),
        export_id: export.map(|e| e.export_id),
        output_location: Some(output_path.display().to_string()),
    };
    let task = tokio::task::spawn_blocking(move || append_history(&settings, entry));
    match task.await {
        Ok(stored) => stored,
        Err(err) => {
            warn!(%err, "history task failed");
            None
        }
    }
}

fn append_history(settings: &Settings, entry: NewHistoryEntry) -> Option<HistoryEntry> {
    let store = HistoryStore::from_settings(settings);
    let stored = match store.append(entry) {
        Ok(stored) => Some(stored),
        Err(err) => {
            warn!(%err, "could not record search history");
            None
        }
    };
    if let Err(err) = store.cleanup(settings.history_retention_days) {
        warn!(%err, "history cleanup failed");
    }
    stored
}
