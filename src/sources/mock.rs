//! In-memory collaborators for tests and dry runs.
//!
//! Each mock records the calls it receives so tests can assert on ordering
//! and call counts. Clones share state.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::patents::{PrimaryMetadata, SecondaryData, SeedPatentRecord, SourceKind};

use super::{
    EnrichmentError, EnrichmentSession, ExtractionError, FetchError, MetadataExtractor,
    RecordFetcher, SecondaryEnricher, SeedBatch,
};

/// Fetcher returning a fixed seed list.
#[derive(Clone)]
pub struct MockFetcher {
    kind: SourceKind,
    batch: SeedBatch,
    calls: Arc<Mutex<Vec<(String, Option<usize>)>>>,
}

impl MockFetcher {
    pub fn new(kind: SourceKind, identifiers: &[&str]) -> Self {
        Self::with_records(
            kind,
            identifiers.iter().map(|id| SeedPatentRecord::new(*id)).collect(),
        )
    }

    pub fn with_records(kind: SourceKind, records: Vec<SeedPatentRecord>) -> Self {
        Self {
            kind,
            batch: SeedBatch {
                display_name: None,
                records,
            },
            calls: Arc::default(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.batch.display_name = Some(name.into());
        self
    }

    pub fn calls(&self) -> Vec<(String, Option<usize>)> {
        self.calls.lock().expect("mock lock").clone()
    }
}

#[async_trait]
impl RecordFetcher for MockFetcher {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(
        &self,
        search_key: &str,
        limit: Option<usize>,
    ) -> Result<SeedBatch, FetchError> {
        self.calls
            .lock()
            .expect("mock lock")
            .push((search_key.to_string(), limit));
        if self.batch.records.is_empty() {
            return Err(FetchError::NoData {
                source_name: "mock",
                key: search_key.to_string(),
            });
        }
        Ok(self.batch.clone())
    }
}

/// Canned outcome for one identifier.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Found(PrimaryMetadata),
    Failed(String),
    Unavailable,
}

/// Extractor answering from a table; unknown identifiers are not found.
#[derive(Clone, Default)]
pub struct MockExtractor {
    outcomes: Arc<Mutex<HashMap<String, MockOutcome>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a patent with the given family list.
    pub fn with_patent(self, identifier: &str, family: &[&str]) -> Self {
        let primary = PrimaryMetadata {
            title: format!("Title of {identifier}"),
            family_members: family.iter().map(|m| m.to_string()).collect(),
            ..PrimaryMetadata::default()
        };
        self.with_outcome(identifier, MockOutcome::Found(primary))
    }

    pub fn with_failure(self, identifier: &str, message: &str) -> Self {
        self.with_outcome(identifier, MockOutcome::Failed(message.to_string()))
    }

    pub fn with_outcome(self, identifier: &str, outcome: MockOutcome) -> Self {
        self.outcomes
            .lock()
            .expect("mock lock")
            .insert(identifier.to_string(), outcome);
        self
    }

    /// Identifiers requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock lock").clone()
    }
}

#[async_trait]
impl MetadataExtractor for MockExtractor {
    async fn extract(&self, identifier: &str) -> Result<PrimaryMetadata, ExtractionError> {
        self.calls
            .lock()
            .expect("mock lock")
            .push(identifier.to_string());
        let outcome = self
            .outcomes
            .lock()
            .expect("mock lock")
            .get(identifier)
            .cloned();
        match outcome {
            Some(MockOutcome::Found(primary)) => Ok(primary),
            Some(MockOutcome::Failed(message)) => Err(ExtractionError::Http(message)),
            Some(MockOutcome::Unavailable) => {
                Err(ExtractionError::Unavailable("mock backend down".to_string()))
            }
            None => Err(ExtractionError::NotFound {
                identifier: identifier.to_string(),
            }),
        }
    }
}

/// Enricher answering from a table; unknown identifiers yield empty data.
#[derive(Clone, Default)]
pub struct MockEnricher {
    data: Arc<Mutex<HashMap<String, Result<SecondaryData, String>>>>,
    refuse_session: bool,
    unavailable_after: Option<usize>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    opened: Arc<Mutex<usize>>,
    closed: Arc<Mutex<usize>>,
}

impl MockEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(self, identifier: &str, data: SecondaryData) -> Self {
        self.data
            .lock()
            .expect("mock lock")
            .insert(identifier.to_string(), Ok(data));
        self
    }

    pub fn with_failure(self, identifier: &str, message: &str) -> Self {
        self.data
            .lock()
            .expect("mock lock")
            .insert(identifier.to_string(), Err(message.to_string()));
        self
    }

    /// Make `open_session` fail.
    pub fn refusing_sessions(mut self) -> Self {
        self.refuse_session = true;
        self
    }

    /// Report the backend as lost once `calls` enrichments have succeeded.
    pub fn unavailable_after(mut self, calls: usize) -> Self {
        self.unavailable_after = Some(calls);
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("mock lock").clone()
    }

    pub fn sessions_opened(&self) -> usize {
        *self.opened.lock().expect("mock lock")
    }

    pub fn sessions_closed(&self) -> usize {
        *self.closed.lock().expect("mock lock")
    }
}

#[async_trait]
impl SecondaryEnricher for MockEnricher {
    async fn open_session(&self) -> Result<Box<dyn EnrichmentSession>, EnrichmentError> {
        if self.refuse_session {
            return Err(EnrichmentError::Unavailable(
                "mock session refused".to_string(),
            ));
        }
        *self.opened.lock().expect("mock lock") += 1;
        Ok(Box::new(MockSession {
            enricher: self.clone(),
        }))
    }
}

struct MockSession {
    enricher: MockEnricher,
}

#[async_trait]
impl EnrichmentSession for MockSession {
    async fn enrich(
        &mut self,
        identifier: &str,
        url: &str,
    ) -> Result<SecondaryData, EnrichmentError> {
        let served = {
            let mut calls = self.enricher.calls.lock().expect("mock lock");
            calls.push((identifier.to_string(), url.to_string()));
            calls.len() - 1
        };
        if self.enricher.unavailable_after.is_some_and(|limit| served >= limit) {
            return Err(EnrichmentError::Unavailable("mock session lost".to_string()));
        }
        match self.enricher.data.lock().expect("mock lock").get(identifier) {
            Some(Ok(data)) => Ok(data.clone()),
            Some(Err(message)) => Err(EnrichmentError::Transport(message.clone())),
            None => Ok(SecondaryData::default()),
        }
    }

    async fn close(self: Box<Self>) {
        *self.enricher.closed.lock().expect("mock lock") += 1;
    }
}
