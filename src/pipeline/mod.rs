//! Pipeline orchestrator: seed fetch, primary extraction, family expansion,
//! secondary enrichment and consolidation.
//!
//! Stages run strictly in sequence and items within a stage one at a time in
//! source order. Per-item failures are recorded on the item and in the error
//! log; only a missing seed list or an unreachable backend ends a run early.

pub mod config;
pub mod error;
pub mod progress;
pub mod report;

use tracing::{debug, info, instrument, warn};

use crate::{
    patents::{
        derive_urls,
        family::select_family_members,
        DedupSet, PatentMetadata, Provenance, SeedPatentRecord,
    },
    sources::{EnrichmentSession, MetadataExtractor, RecordFetcher, SecondaryEnricher},
};

pub use config::RunConfiguration;
pub use error::PipelineError;
pub use progress::{LogProgress, ProgressSink, SilentProgress};
pub use report::{ConsolidatedResult, ErrorEntry, ErrorLog, RunStage, RunSummary};

use progress::{Phase, PhaseProgress};

/// Wires the collaborators for one or more runs.
pub struct Pipeline<'a> {
    fetcher: &'a dyn RecordFetcher,
    extractor: &'a dyn MetadataExtractor,
    enricher: &'a dyn SecondaryEnricher,
    progress: &'a dyn ProgressSink,
}

/// Mutable state owned by a single run.
struct RunState<'c> {
    config: &'c RunConfiguration,
    stage: RunStage,
    dedup: DedupSet,
    records: Vec<PatentMetadata>,
    errors: ErrorLog,
    display_name: Option<String>,
    enrichment_failures: usize,
}

/// A stage could not continue; the run ends with a partial result.
struct Fatal {
    stage: RunStage,
    message: String,
}

impl<'c> RunState<'c> {
    fn new(config: &'c RunConfiguration, dedup: DedupSet) -> Self {
        Self {
            config,
            stage: RunStage::Init,
            dedup,
            records: Vec::new(),
            errors: ErrorLog::default(),
            display_name: None,
            enrichment_failures: 0,
        }
    }

    fn enter(&mut self, stage: RunStage) {
        debug!(from = %self.stage, to = %stage, "stage transition");
        self.stage = stage;
    }

    fn into_result(self, status: RunStage) -> ConsolidatedResult {
        let summary = RunSummary::from_records(
            &self.records,
            self.dedup.duplicates_removed(),
            self.enrichment_failures,
        );
        ConsolidatedResult {
            status,
            display_name: self.display_name,
            records: self.records,
            summary,
            errors: self.errors.into_entries(),
        }
    }

    fn abort(mut self, fatal: Fatal) -> PipelineError {
        warn!(stage = %fatal.stage, message = %fatal.message, "run aborted");
        self.errors.push(fatal.stage, None, fatal.message.clone());
        self.enter(RunStage::Failed);
        PipelineError::BackendUnavailable {
            stage: fatal.stage,
            message: fatal.message,
            partial: Box::new(self.into_result(RunStage::Failed)),
        }
    }
}

impl<'a> Pipeline<'a> {
    pub fn new(
        fetcher: &'a dyn RecordFetcher,
        extractor: &'a dyn MetadataExtractor,
        enricher: &'a dyn SecondaryEnricher,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            enricher,
            progress,
        }
    }

    /// Execute one run with a fresh dedup set.
    pub async fn run(&self, config: &RunConfiguration) -> Result<ConsolidatedResult, PipelineError> {
        self.run_with_dedup(config, DedupSet::new()).await
    }

    /// Execute one run against `dedup`. Identifiers already in the set are
    /// treated as seen and count as duplicates when encountered.
    #[instrument(skip(self, config, dedup), fields(key = %config.search_key, source = %config.source_kind))]
    pub async fn run_with_dedup(
        &self,
        config: &RunConfiguration,
        dedup: DedupSet,
    ) -> Result<ConsolidatedResult, PipelineError> {
        config.validate()?;
        info!(
            countries = ?config.target_countries,
            max_family = config.max_family_per_country,
            max_seeds = ?config.max_seed_records,
            enrich = config.enrich_secondary,
            "starting patent pipeline"
        );
        let mut run = RunState::new(config, dedup);

        run.enter(RunStage::FetchingSeeds);
        let seeds = match self.fetch_seeds(&mut run).await {
            Ok(seeds) => seeds,
            Err(err) => {
                run.enter(RunStage::Failed);
                return Err(err);
            }
        };

        run.enter(RunStage::ExtractingPrimary);
        if let Err(fatal) = self.extract_seeds(&mut run, seeds).await {
            return Err(run.abort(fatal));
        }

        run.enter(RunStage::ExpandingFamilies);
        if let Err(fatal) = self.expand_families(&mut run).await {
            return Err(run.abort(fatal));
        }

        if config.enrich_secondary {
            run.enter(RunStage::EnrichingSecondary);
            if let Err(fatal) = self.enrich_records(&mut run).await {
                return Err(run.abort(fatal));
            }
        } else {
            debug!("secondary enrichment disabled");
        }

        run.enter(RunStage::AssemblingOutput);
        let result = run.into_result(RunStage::Complete);
        info!(
            total = result.summary.total,
            seeds = result.summary.seed_count,
            families = result.summary.family_count,
            duplicates = result.summary.duplicates_removed,
            errors = result.summary.error_count,
            "pipeline complete"
        );
        self.progress.report(100, "Completed");
        Ok(result)
    }

    async fn fetch_seeds(
        &self,
        run: &mut RunState<'_>,
    ) -> Result<Vec<SeedPatentRecord>, PipelineError> {
        let config = run.config;
        let batch = self
            .fetcher
            .fetch(&config.search_key, config.max_seed_records)
            .await?;
        let mut seeds = batch.records;
        if let Some(max) = config.max_seed_records {
            if seeds.len() > max {
                info!(from = seeds.len(), to = max, "limiting seed patents");
                seeds.truncate(max);
            }
        }
        if seeds.is_empty() {
            return Err(PipelineError::NoSeeds {
                key: config.search_key.clone(),
            });
        }
        run.display_name = batch.display_name;
        info!(count = seeds.len(), source = %self.fetcher.kind(), "fetched seed patents");
        Ok(seeds)
    }

    async fn extract_seeds(
        &self,
        run: &mut RunState<'_>,
        seeds: Vec<SeedPatentRecord>,
    ) -> Result<(), Fatal> {
        let progress = PhaseProgress::new(self.progress, Phase::Primary, seeds.len());
        let provenance = Provenance::Seed(self.fetcher.kind());

        for (idx, seed) in seeds.into_iter().enumerate() {
            let identifier = seed.identifier.trim().to_string();
            if identifier.is_empty() {
                run.errors
                    .push(RunStage::ExtractingPrimary, None, "seed without identifier skipped");
            } else if run.dedup.try_admit(&identifier) {
                let urls = seed.source_urls.or_fill(derive_urls(&identifier));
                let (mut record, fatal) = self
                    .extract_one(run, &identifier, provenance.clone(), RunStage::ExtractingPrimary)
                    .await;
                record.urls = urls;
                record.annotations = seed.annotations;
                run.records.push(record);
                if let Some(fatal) = fatal {
                    return Err(fatal);
                }
            } else {
                info!(%identifier, "removed duplicate seed");
            }
            progress.step(idx + 1, &identifier);
        }
        Ok(())
    }

    /// One level of family expansion: only seeds with primary metadata
    /// contribute members, and family-derived records are never expanded.
    async fn expand_families(&self, run: &mut RunState<'_>) -> Result<(), Fatal> {
        let config = run.config;
        if config.max_family_per_country == 0 {
            debug!("family expansion disabled");
            return Ok(());
        }
        let parents: Vec<(String, Vec<String>)> = run
            .records
            .iter()
            .filter(|r| !r.provenance.is_family() && !r.is_error() && !r.family_members.is_empty())
            .map(|r| (r.identifier.clone(), r.family_members.clone()))
            .collect();
        let progress = PhaseProgress::new(self.progress, Phase::Families, parents.len());

        for (idx, (parent, family)) in parents.iter().enumerate() {
            let selections = select_family_members(
                family,
                &config.target_countries,
                config.max_family_per_country,
            );
            for selection in selections {
                debug!(
                    %parent,
                    country = %selection.country,
                    found = selection.found,
                    selected = selection.selected.len(),
                    "family members by country"
                );
                for member in selection.selected {
                    let member = member.trim();
                    if !run.dedup.try_admit(member) {
                        info!(%member, %parent, "removed duplicate family member");
                        continue;
                    }
                    let provenance = Provenance::FamilyMemberOf(parent.clone());
                    let (record, fatal) = self
                        .extract_one(run, member, provenance, RunStage::ExpandingFamilies)
                        .await;
                    run.records.push(record);
                    if let Some(fatal) = fatal {
                        return Err(fatal);
                    }
                }
            }
            progress.step(idx + 1, parent);
        }
        Ok(())
    }

    /// Primary extraction for an admitted identifier. Always yields a record;
    /// an unreachable backend also yields the fatal condition.
    async fn extract_one(
        &self,
        run: &mut RunState<'_>,
        identifier: &str,
        provenance: Provenance,
        stage: RunStage,
    ) -> (PatentMetadata, Option<Fatal>) {
        match self.extractor.extract(identifier).await {
            Ok(primary) => {
                debug!(%identifier, family = primary.family_members.len(), "extracted metadata");
                (PatentMetadata::from_primary(identifier, primary, provenance), None)
            }
            Err(err) => {
                let message = err.to_string();
                run.errors.push(stage, Some(identifier), message.clone());
                let fatal = err.is_unavailable().then(|| Fatal {
                    stage,
                    message: message.clone(),
                });
                (PatentMetadata::failed(identifier, provenance, message), fatal)
            }
        }
    }

    /// Enrich every admitted record through one session, closed on every
    /// exit path.
    async fn enrich_records(&self, run: &mut RunState<'_>) -> Result<(), Fatal> {
        let mut session = self.enricher.open_session().await.map_err(|err| Fatal {
            stage: RunStage::EnrichingSecondary,
            message: err.to_string(),
        })?;
        let outcome = self.enrich_with(run, session.as_mut()).await;
        session.close().await;
        outcome
    }

    async fn enrich_with(
        &self,
        run: &mut RunState<'_>,
        session: &mut dyn EnrichmentSession,
    ) -> Result<(), Fatal> {
        let total = run.records.len();
        let progress = PhaseProgress::new(self.progress, Phase::Enrichment, total);

        for idx in 0..total {
            let (identifier, url) = {
                let record = &run.records[idx];
                (record.identifier.clone(), record.urls.google_patents.clone())
            };
            if url.trim().is_empty() {
                debug!(%identifier, "no enrichment url");
                run.records[idx].clear_secondary();
            } else {
                match session.enrich(&identifier, &url).await {
                    Ok(data) => {
                        debug!(%identifier, found = %data.describe(), "enriched");
                        run.records[idx].apply_secondary(data);
                    }
                    Err(err) if err.is_unavailable() => {
                        run.records[idx].clear_secondary();
                        return Err(Fatal {
                            stage: RunStage::EnrichingSecondary,
                            message: err.to_string(),
                        });
                    }
                    Err(err) => {
                        run.records[idx].clear_secondary();
                        run.enrichment_failures += 1;
                        run.errors.push(
                            RunStage::EnrichingSecondary,
                            Some(&identifier),
                            err.to_string(),
                        );
                    }
                }
            }
            progress.step(idx + 1, &identifier);
        }
        Ok(())
    }
}
