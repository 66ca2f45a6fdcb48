//! Consolidated JSON, flat CSV and plain-text pipeline log on local disk.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::info;

use crate::{
    config::Settings,
    patents::PatentMetadata,
    pipeline::{ConsolidatedResult, ErrorEntry, RunStage, RunSummary},
};

use super::{file_stem, record_row, OutputError, OutputSink, RunMetadata, RECORD_COLUMNS};

/// Writes `<key>_patents.json`, `<key>_patents.csv` and
/// `pipeline_logs/<key>_<date>.log` under one directory. Results of a failed
/// run go to `<key>_patents.partial.json` and `.csv` so they never replace
/// the last complete output.
#[derive(Debug, Clone)]
pub struct FileSink {
    root: PathBuf,
}

#[derive(Serialize)]
struct ConsolidatedFile<'a> {
    pipeline_info: &'a RunMetadata,
    summary: &'a RunSummary,
    errors: &'a [ErrorEntry],
    patents: &'a [PatentMetadata],
}

impl FileSink {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.outputs_dir.clone())
    }

    pub fn json_path(&self, run: &RunMetadata) -> PathBuf {
        self.root.join(format!("{}.json", artefact_stem(run)))
    }

    pub fn csv_path(&self, run: &RunMetadata) -> PathBuf {
        self.root.join(format!("{}.csv", artefact_stem(run)))
    }

    pub fn log_path(&self, run: &RunMetadata) -> PathBuf {
        self.root.join("pipeline_logs").join(format!(
            "{}_{}.log",
            file_stem(&run.search_key),
            run.started_at.format("%Y-%m-%d")
        ))
    }

    fn write_json(
        &self,
        path: &Path,
        result: &ConsolidatedResult,
        run: &RunMetadata,
    ) -> Result<(), OutputError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let doc = ConsolidatedFile {
            pipeline_info: run,
            summary: &result.summary,
            errors: &result.errors,
            patents: &result.records,
        };
        serde_json::to_writer_pretty(&mut writer, &doc)?;
        writer.flush()?;
        Ok(())
    }

    fn write_csv(&self, path: &Path, records: &[PatentMetadata]) -> Result<(), OutputError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(RECORD_COLUMNS)?;
        for record in records {
            writer.write_record(record_row(record))?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_log(
        &self,
        path: &Path,
        result: &ConsolidatedResult,
        run: &RunMetadata,
    ) -> Result<(), OutputError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = BufWriter::new(File::create(path)?);
        writeln!(
            file,
            "search: {} ({}) status: {} started: {} finished: {}",
            run.search_key,
            run.source_kind,
            run.status,
            run.started_at.to_rfc3339(),
            run.finished_at.to_rfc3339()
        )?;
        let summary = &result.summary;
        writeln!(
            file,
            "total: {} seeds: {} families: {} duplicates removed: {} errors: {} enrichment failures: {}",
            summary.total,
            summary.seed_count,
            summary.family_count,
            summary.duplicates_removed,
            summary.error_count,
            summary.enrichment_failures
        )?;
        for entry in &result.errors {
            writeln!(file, "{entry}")?;
        }
        file.flush()?;
        Ok(())
    }
}

fn artefact_stem(run: &RunMetadata) -> String {
    let stem = file_stem(&run.search_key);
    if run.status == RunStage::Complete {
        format!("{stem}_patents")
    } else {
        format!("{stem}_patents.partial")
    }
}

impl OutputSink for FileSink {
    fn persist(
        &self,
        result: &ConsolidatedResult,
        run: &RunMetadata,
    ) -> Result<PathBuf, OutputError> {
        std::fs::create_dir_all(&self.root)?;
        let json_path = self.json_path(run);
        self.write_json(&json_path, result, run)?;
        let csv_path = self.csv_path(run);
        self.write_csv(&csv_path, &result.records)?;
        let log_path = self.log_path(run);
        self.write_log(&log_path, result, run)?;
        info!(
            path = %json_path.display(),
            count = result.records.len(),
            "saved consolidated patents"
        );
        Ok(json_path)
    }
}
