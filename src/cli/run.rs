//! CLI entry-point for a single foreground pipeline run.

use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::{
    config::Settings,
    jobs::{self, PipelineRequest},
    patents::SourceKind,
    pipeline::{config::DEFAULT_MAX_FAMILY_PER_COUNTRY, LogProgress},
};

/// Args for the `run` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Compound keyword for PubChem, or a DrugBank id with `--source drugbank`.
    pub keyword: Option<String>,
    /// Where the seed patent list comes from.
    #[arg(long, value_enum, default_value_t = SourceKind::Pubchem)]
    pub source: SourceKind,
    /// DrugBank accession (e.g. DB05541); implies `--source drugbank`.
    #[arg(long)]
    pub drugbank_id: Option<String>,
    /// Comma separated jurisdictions to expand families into.
    #[arg(long, value_delimiter = ',', default_value = "US")]
    pub countries: Vec<String>,
    /// Family members kept per country and seed; 0 disables expansion.
    #[arg(long, default_value_t = DEFAULT_MAX_FAMILY_PER_COUNTRY)]
    pub max_families: usize,
    /// Only process the first N seed patents.
    #[arg(long)]
    pub max_seeds: Option<usize>,
    /// Skip the Google Patents enrichment pass.
    #[arg(long)]
    pub no_enrich: bool,
    /// Also export the result to Google Sheets.
    #[arg(long)]
    pub export_sheets: bool,
}

impl Args {
    fn into_request(self) -> Result<PipelineRequest> {
        let (source, key) = match (self.drugbank_id, self.keyword) {
            (Some(id), _) => (SourceKind::Drugbank, id),
            (None, Some(keyword)) => (self.source, keyword),
            (None, None) => bail!("a keyword or --drugbank-id is required"),
        };
        let mut request = PipelineRequest::new(source, key);
        request.countries = self.countries;
        request.max_families = self.max_families;
        request.max_seeds = self.max_seeds;
        request.enrich = !self.no_enrich;
        request.export_sheets = self.export_sheets;
        Ok(request)
    }
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let request = args.into_request()?;
    let outcome = jobs::execute(&settings, &request, &LogProgress).await?;

    let summary = &outcome.result.summary;
    let name = outcome
        .result
        .display_name
        .clone()
        .unwrap_or_else(|| request.search_key());
    println!("{name}: {} patents", summary.total);
    println!(
        "  seeds {}  family {}  duplicates removed {}  errors {}",
        summary.seed_count, summary.family_count, summary.duplicates_removed, summary.error_count
    );
    for (country, count) in &summary.per_country_counts {
        println!("  {country}: {count}");
    }
    println!("saved {}", outcome.output_path.display());
    if let Some(export) = &outcome.export {
        println!("sheets {}", export.url);
    }
    Ok(())
}
