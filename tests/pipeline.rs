use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use patent_harvest::{
    patents::{Provenance, SecondaryData, SourceKind},
    pipeline::{
        ConsolidatedResult, Pipeline, PipelineError, RunConfiguration, RunStage, SilentProgress,
    },
    sources::mock::{MockEnricher, MockExtractor, MockFetcher, MockOutcome},
};
use proptest::prelude::*;

fn config() -> RunConfiguration {
    RunConfiguration::new("aspirin", SourceKind::Pubchem)
}

async fn run_ok(
    fetcher: &MockFetcher,
    extractor: &MockExtractor,
    enricher: &MockEnricher,
    config: &RunConfiguration,
) -> ConsolidatedResult {
    Pipeline::new(fetcher, extractor, enricher, &SilentProgress)
        .run(config)
        .await
        .expect("pipeline run")
}

fn ids(result: &ConsolidatedResult) -> Vec<&str> {
    result.records.iter().map(|r| r.identifier.as_str()).collect()
}

#[tokio::test]
async fn duplicate_seeds_are_admitted_once() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["US-1-A1", "US-1-A1"]);
    let extractor = MockExtractor::new().with_patent("US-1-A1", &[]);
    let enricher = MockEnricher::new();

    let result = run_ok(&fetcher, &extractor, &enricher, &config()).await;

    assert!(result.is_complete());
    assert_eq!(ids(&result), vec!["US-1-A1"]);
    assert_eq!(result.summary.duplicates_removed, 1);
    assert_eq!(extractor.calls(), vec!["US-1-A1"]);
}

#[tokio::test]
async fn zero_family_cap_disables_expansion() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["US-1-A1"]);
    let extractor = MockExtractor::new()
        .with_patent("US-1-A1", &["US-2-A1", "US-3-A1"])
        .with_patent("US-2-A1", &[]);
    let enricher = MockEnricher::new();

    let result = run_ok(&fetcher, &extractor, &enricher, &config().with_max_family(0)).await;

    assert_eq!(ids(&result), vec!["US-1-A1"]);
    assert_eq!(result.summary.family_count, 0);
    assert_eq!(extractor.calls(), vec!["US-1-A1"]);
}

#[tokio::test]
async fn family_cap_keeps_first_members_in_order() {
    let family: Vec<String> = (10..20).map(|n| format!("US-{n}-A1")).collect();
    let family_refs: Vec<&str> = family.iter().map(String::as_str).collect();
    let mut extractor = MockExtractor::new().with_patent("US-1-A1", &family_refs);
    for member in &family {
        extractor = extractor.with_patent(member, &[]);
    }
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["US-1-A1"]);
    let enricher = MockEnricher::new();

    let result = run_ok(&fetcher, &extractor, &enricher, &config().with_max_family(3)).await;

    assert_eq!(ids(&result), vec!["US-1-A1", "US-10-A1", "US-11-A1", "US-12-A1"]);
    for record in &result.records[1..] {
        assert_eq!(
            record.provenance,
            Provenance::FamilyMemberOf("US-1-A1".to_string())
        );
    }
    assert_eq!(result.summary.seed_count, 1);
    assert_eq!(result.summary.family_count, 3);
}

#[tokio::test]
async fn only_target_countries_are_expanded() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["WO-1-A1"]);
    let extractor = MockExtractor::new()
        .with_patent("WO-1-A1", &["US-2-A1", "EP-3-A1", "USX-999", "JP-4-A"])
        .with_patent("US-2-A1", &[])
        .with_patent("EP-3-A1", &[]);
    let enricher = MockEnricher::new();
    let config = config().with_countries(["us", "EP"]);

    let result = run_ok(&fetcher, &extractor, &enricher, &config).await;

    assert_eq!(ids(&result), vec!["WO-1-A1", "US-2-A1", "EP-3-A1"]);
    assert_eq!(result.summary.per_country_counts.get("US"), Some(&1));
    assert_eq!(result.summary.per_country_counts.get("EP"), Some(&1));
    assert_eq!(result.summary.per_country_counts.get("WO"), Some(&1));
}

#[tokio::test]
async fn failed_seed_is_retained_and_run_continues() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["US-1-A1", "US-2-A1"]);
    let extractor = MockExtractor::new()
        .with_failure("US-1-A1", "pug view returned 500")
        .with_patent("US-2-A1", &[]);
    let enricher = MockEnricher::new();

    let result = run_ok(&fetcher, &extractor, &enricher, &config()).await;

    assert!(result.is_complete());
    assert_eq!(ids(&result), vec!["US-1-A1", "US-2-A1"]);
    let failed = result.get("US-1-A1").expect("stub kept");
    assert!(failed.is_error());
    assert!(failed.error.as_deref().unwrap_or_default().contains("500"));
    assert!(!result.get("US-2-A1").expect("second seed").is_error());
    assert_eq!(result.summary.error_count, 1);
    let entry = &result.errors[0];
    assert_eq!(entry.stage, RunStage::ExtractingPrimary);
    assert_eq!(entry.identifier.as_deref(), Some("US-1-A1"));
}

#[tokio::test]
async fn failed_seed_contributes_no_family() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["US-1-A1"]);
    let extractor = MockExtractor::new().with_failure("US-1-A1", "timeout");
    let enricher = MockEnricher::new();

    let result = run_ok(&fetcher, &extractor, &enricher, &config()).await;

    assert_eq!(ids(&result), vec!["US-1-A1"]);
    assert_eq!(extractor.calls(), vec!["US-1-A1"]);
}

#[tokio::test]
async fn shared_family_member_belongs_to_first_parent() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["WO-1-A1", "WO-2-A1"]);
    let extractor = MockExtractor::new()
        .with_patent("WO-1-A1", &["US-9-A1"])
        .with_patent("WO-2-A1", &["US-9-A1"])
        .with_patent("US-9-A1", &[]);
    let enricher = MockEnricher::new();

    let result = run_ok(&fetcher, &extractor, &enricher, &config()).await;

    assert_eq!(ids(&result), vec!["WO-1-A1", "WO-2-A1", "US-9-A1"]);
    assert_eq!(
        result.get("US-9-A1").expect("member").provenance,
        Provenance::FamilyMemberOf("WO-1-A1".to_string())
    );
    assert_eq!(result.summary.duplicates_removed, 1);
    assert_eq!(
        extractor.calls().iter().filter(|id| *id == "US-9-A1").count(),
        1
    );
}

#[tokio::test]
async fn family_member_already_seeded_keeps_seed_provenance() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["WO-1-A1", "US-2-A1"]);
    let extractor = MockExtractor::new()
        .with_patent("WO-1-A1", &["US-2-A1"])
        .with_patent("US-2-A1", &[]);
    let enricher = MockEnricher::new();

    let result = run_ok(&fetcher, &extractor, &enricher, &config()).await;

    assert_eq!(ids(&result), vec!["WO-1-A1", "US-2-A1"]);
    assert_eq!(
        result.get("US-2-A1").expect("seed").provenance,
        Provenance::Seed(SourceKind::Pubchem)
    );
    assert_eq!(result.summary.duplicates_removed, 1);
}

#[tokio::test]
async fn family_members_are_not_expanded_further() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["WO-1-A1"]);
    let extractor = MockExtractor::new()
        .with_patent("WO-1-A1", &["US-2-A1"])
        .with_patent("US-2-A1", &["US-3-A1"])
        .with_patent("US-3-A1", &[]);
    let enricher = MockEnricher::new();

    let result = run_ok(&fetcher, &extractor, &enricher, &config()).await;

    assert_eq!(ids(&result), vec!["WO-1-A1", "US-2-A1"]);
    let member = result.get("US-2-A1").unwrap();
    assert_eq!(member.family_members, vec!["US-3-A1"]);
    assert_eq!(
        member.provenance,
        Provenance::FamilyMemberOf("WO-1-A1".to_string())
    );
    assert_eq!(extractor.calls(), vec!["WO-1-A1", "US-2-A1"]);
}

#[tokio::test]
async fn max_seeds_limits_processing() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["US-1-A1", "US-2-A1", "US-3-A1"]);
    let extractor = MockExtractor::new()
        .with_patent("US-1-A1", &[])
        .with_patent("US-2-A1", &[]);
    let enricher = MockEnricher::new();

    let result = run_ok(&fetcher, &extractor, &enricher, &config().with_max_seeds(Some(2))).await;

    assert_eq!(ids(&result), vec!["US-1-A1", "US-2-A1"]);
    assert_eq!(fetcher.calls(), vec![("aspirin".to_string(), Some(2))]);
}

#[tokio::test]
async fn empty_seed_list_fails_the_run() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &[]);
    let extractor = MockExtractor::new();
    let enricher = MockEnricher::new();

    let err = Pipeline::new(&fetcher, &extractor, &enricher, &SilentProgress)
        .run(&config())
        .await
        .expect_err("no seeds");

    assert!(matches!(err, PipelineError::Fetch(_)));
    assert!(err.partial_result().is_none());
    assert!(extractor.calls().is_empty());
}

#[tokio::test]
async fn blank_search_key_is_rejected() {
    let fetcher = MockFetcher::new(SourceKind::Drugbank, &["US-1-A1"]);
    let extractor = MockExtractor::new();
    let enricher = MockEnricher::new();

    let err = Pipeline::new(&fetcher, &extractor, &enricher, &SilentProgress)
        .run(&RunConfiguration::new("  ", SourceKind::Drugbank))
        .await
        .expect_err("blank key");

    assert!(matches!(err, PipelineError::InvalidConfig(_)));
    assert!(fetcher.calls().is_empty());
}

#[tokio::test]
async fn enrichment_fills_secondary_fields() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["WO-2024184281-A1"]);
    let extractor = MockExtractor::new().with_patent("WO-2024184281-A1", &[]);
    let enricher = MockEnricher::new().with_data(
        "WO-2024184281-A1",
        SecondaryData {
            abstract_text: "A compound for treating pain.".to_string(),
            inventors: vec!["Jane Roe".to_string()],
            assignees: vec!["Acme Pharma".to_string()],
            claims: Some(vec!["1. A compound.".to_string()]),
        },
    );

    let result = run_ok(&fetcher, &extractor, &enricher, &config()).await;

    let record = &result.records[0];
    assert_eq!(record.abstract_secondary, "A compound for treating pain.");
    assert_eq!(record.inventors_secondary, vec!["Jane Roe"]);
    assert_eq!(record.claims, Some(vec!["1. A compound.".to_string()]));
    assert_eq!(
        enricher.calls(),
        vec![(
            "WO-2024184281-A1".to_string(),
            "https://patents.google.com/patent/WO2024184281A1/en".to_string()
        )]
    );
    assert_eq!(enricher.sessions_opened(), 1);
    assert_eq!(enricher.sessions_closed(), 1);
}

#[tokio::test]
async fn enrichment_failure_leaves_empty_fields_and_logs() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["US-1-A1", "US-2-A1"]);
    let extractor = MockExtractor::new()
        .with_patent("US-1-A1", &[])
        .with_patent("US-2-A1", &[]);
    let enricher = MockEnricher::new()
        .with_failure("US-1-A1", "page timed out")
        .with_data(
            "US-2-A1",
            SecondaryData {
                abstract_text: "Second".to_string(),
                ..SecondaryData::default()
            },
        );

    let result = run_ok(&fetcher, &extractor, &enricher, &config()).await;

    assert!(result.is_complete());
    let first = result.get("US-1-A1").expect("first");
    assert!(first.abstract_secondary.is_empty());
    assert!(first.inventors_secondary.is_empty());
    assert_eq!(first.claims, Some(Vec::new()));
    assert!(!first.is_error());
    assert_eq!(result.get("US-2-A1").expect("second").abstract_secondary, "Second");
    assert_eq!(result.summary.enrichment_failures, 1);
    assert!(result
        .errors
        .iter()
        .any(|e| e.stage == RunStage::EnrichingSecondary
            && e.identifier.as_deref() == Some("US-1-A1")));
}

#[tokio::test]
async fn disabled_enrichment_opens_no_session() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["US-1-A1"]);
    let extractor = MockExtractor::new().with_patent("US-1-A1", &[]);
    let enricher = MockEnricher::new();

    let result = run_ok(&fetcher, &extractor, &enricher, &config().with_enrichment(false)).await;

    assert_eq!(result.records.len(), 1);
    assert_eq!(enricher.sessions_opened(), 0);
    assert!(enricher.calls().is_empty());
}

#[tokio::test]
async fn refused_session_returns_partial_result() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["US-1-A1", "US-2-A1"]);
    let extractor = MockExtractor::new()
        .with_patent("US-1-A1", &[])
        .with_patent("US-2-A1", &[]);
    let enricher = MockEnricher::new().refusing_sessions();

    let err = Pipeline::new(&fetcher, &extractor, &enricher, &SilentProgress)
        .run(&config())
        .await
        .expect_err("session refused");

    match &err {
        PipelineError::BackendUnavailable { stage, .. } => {
            assert_eq!(*stage, RunStage::EnrichingSecondary)
        }
        other => panic!("unexpected error {other:?}"),
    }
    let partial = err.partial_result().expect("partial result");
    assert_eq!(partial.status, RunStage::Failed);
    assert_eq!(partial.records.len(), 2);
    assert_eq!(enricher.sessions_closed(), 0);
}

#[tokio::test]
async fn session_is_closed_when_backend_is_lost() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["US-1-A1", "US-2-A1", "US-3-A1"]);
    let extractor = MockExtractor::new()
        .with_patent("US-1-A1", &[])
        .with_patent("US-2-A1", &[])
        .with_patent("US-3-A1", &[]);
    let enricher = MockEnricher::new().unavailable_after(1);

    let err = Pipeline::new(&fetcher, &extractor, &enricher, &SilentProgress)
        .run(&config())
        .await
        .expect_err("backend lost");

    assert_eq!(enricher.sessions_opened(), 1);
    assert_eq!(enricher.sessions_closed(), 1);
    assert_eq!(enricher.calls().len(), 2);
    let partial = err.partial_result().expect("partial result");
    assert_eq!(partial.records.len(), 3);
}

#[tokio::test]
async fn unreachable_extractor_aborts_with_partial_result() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["US-1-A1", "US-2-A1", "US-3-A1"]);
    let extractor = MockExtractor::new()
        .with_patent("US-1-A1", &[])
        .with_outcome("US-2-A1", MockOutcome::Unavailable)
        .with_patent("US-3-A1", &[]);
    let enricher = MockEnricher::new();

    let err = Pipeline::new(&fetcher, &extractor, &enricher, &SilentProgress)
        .run(&config())
        .await
        .expect_err("extractor down");

    match &err {
        PipelineError::BackendUnavailable { stage, .. } => {
            assert_eq!(*stage, RunStage::ExtractingPrimary)
        }
        other => panic!("unexpected error {other:?}"),
    }
    let partial = err.partial_result().expect("partial result");
    assert_eq!(partial.records.len(), 2);
    assert!(partial.records[1].is_error());
    assert_eq!(extractor.calls(), vec!["US-1-A1", "US-2-A1"]);
    assert_eq!(enricher.sessions_opened(), 0);
}

#[tokio::test]
async fn progress_is_monotonic_and_finishes_at_100() {
    let fetcher = MockFetcher::new(SourceKind::Pubchem, &["WO-1-A1", "WO-2-A1"]);
    let extractor = MockExtractor::new()
        .with_patent("WO-1-A1", &["US-3-A1"])
        .with_patent("WO-2-A1", &[])
        .with_patent("US-3-A1", &[]);
    let enricher = MockEnricher::new();
    let seen: Arc<Mutex<Vec<(u8, String)>>> = Arc::default();
    let sink = {
        let seen = Arc::clone(&seen);
        move |percent: u8, message: &str| {
            seen.lock().expect("lock").push((percent, message.to_string()));
        }
    };

    Pipeline::new(&fetcher, &extractor, &enricher, &sink)
        .run(&config())
        .await
        .expect("pipeline run");

    let seen = seen.lock().expect("lock");
    let percents: Vec<u8> = seen.iter().map(|(p, _)| *p).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.last(), Some(&100));
    assert!(seen.iter().any(|(_, m)| m.starts_with("Phase 1")));
    assert!(seen.iter().any(|(_, m)| m.starts_with("Phase 3")));
}

#[tokio::test]
async fn seed_annotations_and_display_name_are_kept() {
    use patent_harvest::patents::SeedPatentRecord;

    let seed = SeedPatentRecord::new("US-1-A1").with_annotation("expires_date", "2031-05-01");
    let fetcher = MockFetcher::with_records(SourceKind::Drugbank, vec![seed])
        .with_display_name("Imatinib");
    let extractor = MockExtractor::new().with_patent("US-1-A1", &[]);
    let enricher = MockEnricher::new();
    let config = RunConfiguration::new("DB00619", SourceKind::Drugbank);

    let result = run_ok(&fetcher, &extractor, &enricher, &config).await;

    assert_eq!(result.display_name.as_deref(), Some("Imatinib"));
    let record = &result.records[0];
    assert_eq!(record.provenance, Provenance::Seed(SourceKind::Drugbank));
    assert_eq!(
        record.annotations.get("expires_date").map(String::as_str),
        Some("2031-05-01")
    );
    assert_eq!(record.title, "Title of US-1-A1");
}

const POOL: u8 = 50;
const FAMILY_CAP: usize = 3;

fn pooled_id(n: u8) -> String {
    format!("US-{n}-A1")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn repeated_ids_across_seeds_and_families_are_admitted_once(
        seeds in prop::collection::vec(0..POOL, 100..160),
        families in prop::collection::vec(prop::collection::vec(0..POOL, 0..6), POOL as usize),
    ) {
        let seed_ids: Vec<String> = seeds.iter().map(|n| pooled_id(*n)).collect();
        let seed_refs: Vec<&str> = seed_ids.iter().map(String::as_str).collect();
        let family_ids: Vec<Vec<String>> = families
            .iter()
            .map(|family| family.iter().map(|n| pooled_id(*n)).collect())
            .collect();

        let mut extractor = MockExtractor::new();
        for (n, family) in family_ids.iter().enumerate() {
            let refs: Vec<&str> = family.iter().map(String::as_str).collect();
            extractor = extractor.with_patent(&pooled_id(n as u8), &refs);
        }
        let fetcher = MockFetcher::new(SourceKind::Pubchem, &seed_refs);
        let enricher = MockEnricher::new();
        let config = config().with_max_family(FAMILY_CAP).with_enrichment(false);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = runtime.block_on(run_ok(&fetcher, &extractor, &enricher, &config));

        let distinct_seeds: HashSet<u8> = seeds.iter().copied().collect();
        let family_attempts: usize = distinct_seeds
            .iter()
            .map(|n| families[*n as usize].len().min(FAMILY_CAP))
            .sum();
        let attempts = seeds.len() + family_attempts;

        let unique: HashSet<&str> = ids(&result).into_iter().collect();
        prop_assert_eq!(unique.len(), result.records.len());
        prop_assert_eq!(result.summary.total, result.records.len());
        prop_assert_eq!(
            result.records.len() + result.summary.duplicates_removed,
            attempts
        );
        let calls = extractor.calls();
        let called: HashSet<&String> = calls.iter().collect();
        prop_assert_eq!(called.len(), calls.len());
        prop_assert_eq!(calls.len(), result.records.len());
    }
}
