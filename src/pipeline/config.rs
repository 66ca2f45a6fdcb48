//! Per-run configuration, fixed for the duration of a run.

use serde::{Deserialize, Serialize};

use crate::patents::SourceKind;

use super::PipelineError;

pub const DEFAULT_MAX_FAMILY_PER_COUNTRY: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Compound keyword (PubChem) or DrugBank accession.
    pub search_key: String,
    pub source_kind: SourceKind,
    /// Upper-cased jurisdiction codes, unique, in caller order.
    pub target_countries: Vec<String>,
    pub max_family_per_country: usize,
    pub max_seed_records: Option<usize>,
    pub enrich_secondary: bool,
}

impl RunConfiguration {
    pub fn new(search_key: impl Into<String>, source_kind: SourceKind) -> Self {
        Self {
            search_key: search_key.into().trim().to_string(),
            source_kind,
            target_countries: vec!["US".to_string()],
            max_family_per_country: DEFAULT_MAX_FAMILY_PER_COUNTRY,
            max_seed_records: None,
            enrich_secondary: true,
        }
    }

    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.target_countries = normalize_countries(countries);
        self
    }

    pub fn with_max_family(mut self, max: usize) -> Self {
        self.max_family_per_country = max;
        self
    }

    pub fn with_max_seeds(mut self, max: Option<usize>) -> Self {
        self.max_seed_records = max;
        self
    }

    pub fn with_enrichment(mut self, enabled: bool) -> Self {
        self.enrich_secondary = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.search_key.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(format!(
                "a search key is required for source '{}'",
                self.source_kind
            )));
        }
        Ok(())
    }
}

/// Trim, upper-case and de-duplicate country codes, dropping blanks.
pub fn normalize_countries<I, S>(countries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for country in countries {
        let code = country.as_ref().trim().to_ascii_uppercase();
        if !code.is_empty() && !out.contains(&code) {
            out.push(code);
        }
    }
    out
}
