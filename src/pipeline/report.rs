//! Run outputs: consolidated records, summary counters and the error log.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::patents::PatentMetadata;

/// Lifecycle of a single run. Stages advance strictly in declaration order;
/// `Failed` can be entered from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStage {
    Init,
    FetchingSeeds,
    ExtractingPrimary,
    ExpandingFamilies,
    EnrichingSecondary,
    AssemblingOutput,
    Complete,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::FetchingSeeds => "FETCHING_SEEDS",
            Self::ExtractingPrimary => "EXTRACTING_PRIMARY",
            Self::ExpandingFamilies => "EXPANDING_FAMILIES",
            Self::EnrichingSecondary => "ENRICHING_SECONDARY",
            Self::AssemblingOutput => "ASSEMBLING_OUTPUT",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub stage: RunStage,
    pub identifier: Option<String>,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%Y-%m-%d %H:%M:%S"), self.stage)?;
        if let Some(id) = &self.identifier {
            write!(f, " {id}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Aggregate of every per-item failure in a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorLog {
    entries: Vec<ErrorEntry>,
}

impl ErrorLog {
    pub fn push(&mut self, stage: RunStage, identifier: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        warn!(%stage, identifier = identifier.unwrap_or("-"), "{message}");
        self.entries.push(ErrorEntry {
            stage,
            identifier: identifier.map(str::to_string),
            message,
            at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<ErrorEntry> {
        self.entries
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub seed_count: usize,
    pub family_count: usize,
    /// Admission attempts rejected because the identifier was already seen.
    pub duplicates_removed: usize,
    pub per_country_counts: BTreeMap<String, usize>,
    /// Records retained with `error` set.
    pub error_count: usize,
    pub enrichment_failures: usize,
}

impl RunSummary {
    pub fn from_records(
        records: &[PatentMetadata],
        duplicates_removed: usize,
        enrichment_failures: usize,
    ) -> Self {
        let mut per_country_counts = BTreeMap::new();
        for record in records {
            *per_country_counts.entry(record.country_key()).or_insert(0) += 1;
        }
        let family_count = records.iter().filter(|r| r.provenance.is_family()).count();
        Self {
            total: records.len(),
            seed_count: records.len() - family_count,
            family_count,
            duplicates_removed,
            per_country_counts,
            error_count: records.iter().filter(|r| r.is_error()).count(),
            enrichment_failures,
        }
    }
}

/// Everything a run produced, in admission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedResult {
    /// `Complete`, or `Failed` for the partial result of an aborted run.
    pub status: RunStage,
    pub display_name: Option<String>,
    pub records: Vec<PatentMetadata>,
    pub summary: RunSummary,
    pub errors: Vec<ErrorEntry>,
}

impl ConsolidatedResult {
    pub fn is_complete(&self) -> bool {
        self.status == RunStage::Complete
    }

    pub fn get(&self, identifier: &str) -> Option<&PatentMetadata> {
        self.records.iter().find(|r| r.identifier == identifier)
    }
}
