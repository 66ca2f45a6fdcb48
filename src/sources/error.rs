//! Typed errors raised by the upstream collaborators.

use thiserror::Error;

/// Seed lookup failures. Always fatal for a run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{source_name} returned no usable patent data for '{key}'")]
    NoData { source_name: &'static str, key: String },

    #[error("{source_name} request failed: {message}")]
    Http {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name} response could not be parsed: {message}")]
    Parse {
        source_name: &'static str,
        message: String,
    },
}

/// Primary metadata failures for a single identifier.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("patent {identifier} not found")]
    NotFound { identifier: String },

    #[error("API request failed: {0}")]
    Http(String),

    #[error("data parsing error: {0}")]
    Parse(String),

    /// The extraction backend cannot be reached at all.
    #[error("extraction backend unavailable: {0}")]
    Unavailable(String),
}

impl ExtractionError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Secondary enrichment failures. "No data" is not an error.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("enrichment request failed: {0}")]
    Transport(String),

    /// The session could not be opened or was lost.
    #[error("enrichment backend unavailable: {0}")]
    Unavailable(String),
}

impl EnrichmentError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Classify a transport error: connection-level failures mean the backend is
/// down, everything else is scoped to the one request.
pub(crate) fn is_connect_failure(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_builder()
}
