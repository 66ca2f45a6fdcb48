use thiserror::Error;

use crate::sources::FetchError;

use super::{ConsolidatedResult, RunStage};

/// Run-level failures. Per-item failures never surface here; they are kept
/// on the record and in the error log.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    #[error("seed fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("no seed patents found for '{key}'")]
    NoSeeds { key: String },

    /// A backend went away mid-run. `partial` holds every record admitted
    /// before the failure.
    #[error("backend unavailable during {stage}: {message}")]
    BackendUnavailable {
        stage: RunStage,
        message: String,
        partial: Box<ConsolidatedResult>,
    },
}

impl PipelineError {
    pub fn partial_result(&self) -> Option<&ConsolidatedResult> {
        match self {
            Self::BackendUnavailable { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
