//! Upstream collaborators: seed fetchers, metadata extractors and enrichers.
//!
//! The pipeline only sees the traits below; concrete clients talk to PubChem,
//! DrugBank and Google Patents over HTTP.

pub mod drugbank;
pub mod error;
pub mod google_patents;
pub mod http;
pub mod mock;
pub mod pubchem;

use async_trait::async_trait;

use crate::{
    config::Settings,
    patents::{PrimaryMetadata, SecondaryData, SeedPatentRecord, SourceKind},
};

pub use error::{EnrichmentError, ExtractionError, FetchError};

/// Seeds returned by a fetcher, in upstream order.
#[derive(Debug, Clone, Default)]
pub struct SeedBatch {
    /// Human readable name for the lookup (e.g. the drug name behind a
    /// DrugBank id). `None` when the search key already is one.
    pub display_name: Option<String>,
    pub records: Vec<SeedPatentRecord>,
}

/// Produces the seed patent list for a search key.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch seeds for `search_key`, at most `limit` when given. Fails with
    /// `FetchError` when the upstream has nothing usable.
    async fn fetch(&self, search_key: &str, limit: Option<usize>)
        -> Result<SeedBatch, FetchError>;
}

/// Full primary metadata for one identifier.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, identifier: &str) -> Result<PrimaryMetadata, ExtractionError>;
}

/// Opens the stateful session used for the enrichment pass.
#[async_trait]
pub trait SecondaryEnricher: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn EnrichmentSession>, EnrichmentError>;
}

/// One enrichment session, reused for every record of a run and closed once.
#[async_trait]
pub trait EnrichmentSession: Send {
    async fn enrich(&mut self, identifier: &str, url: &str)
        -> Result<SecondaryData, EnrichmentError>;

    async fn close(self: Box<Self>);
}

/// Pick the seed fetcher for `kind`. Decided once per run.
pub fn fetcher_for(kind: SourceKind, settings: &Settings) -> anyhow::Result<Box<dyn RecordFetcher>> {
    Ok(match kind {
        SourceKind::Pubchem => Box::new(pubchem::PubchemSearchFetcher::new(settings)?),
        SourceKind::Drugbank => Box::new(drugbank::DrugbankFetcher::new(settings)?),
    })
}
