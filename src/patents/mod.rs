//! Patent domain model shared by fetchers, extractors and the pipeline.

pub mod dedup;
pub mod family;
pub mod urls;

use std::fmt;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use dedup::DedupSet;
pub use urls::{derive_urls, PatentUrls};

/// Upstream used to obtain the seed patent list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Compound keyword search against the PubChem patent collection.
    Pubchem,
    /// Patent table of a DrugBank drug page, keyed by DrugBank id.
    Drugbank,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pubchem => "pubchem",
            Self::Drugbank => "drugbank",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A patent identifier returned by the initial lookup, before any extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPatentRecord {
    pub identifier: String,
    pub source_urls: PatentUrls,
    /// Source specific attributes (e.g. DrugBank approval and expiry dates).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub annotations: IndexMap<String, String>,
}

impl SeedPatentRecord {
    /// Seed whose URLs are derived from the identifier alone.
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let source_urls = derive_urls(&identifier);
        Self {
            identifier,
            source_urls,
            annotations: IndexMap::new(),
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// How a record entered the consolidated set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Provenance {
    /// Returned directly by the seed fetcher of the given source.
    Seed(SourceKind),
    /// Listed in the family of the given parent patent.
    FamilyMemberOf(String),
}

impl Provenance {
    pub fn is_family(&self) -> bool {
        matches!(self, Self::FamilyMemberOf(_))
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seed(kind) => write!(f, "seed from {kind}"),
            Self::FamilyMemberOf(parent) => write!(f, "patent family of {parent}"),
        }
    }
}

/// Canonical unit of pipeline output.
///
/// `*_primary` fields come from the metadata extractor, `*_secondary` fields
/// and `claims` from the enrichment pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatentMetadata {
    pub identifier: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub abstract_primary: String,
    #[serde(default)]
    pub abstract_secondary: String,
    #[serde(default)]
    pub inventors_primary: Vec<String>,
    #[serde(default)]
    pub inventors_secondary: Vec<String>,
    #[serde(default)]
    pub assignees_primary: Vec<String>,
    #[serde(default)]
    pub assignees_secondary: Vec<String>,
    #[serde(default)]
    pub priority_date: String,
    #[serde(default)]
    pub filing_date: String,
    #[serde(default)]
    pub publication_date: String,
    #[serde(default)]
    pub country: String,
    /// The family list the extractor reported for this patent. On a seed it
    /// is the list family expansion reads; on a `FamilyMemberOf` record it is
    /// informational only and never expanded. The parent is in `provenance`.
    #[serde(default)]
    pub family_members: Vec<String>,
    /// `None` when the enrichment source has no claims section.
    pub claims: Option<Vec<String>>,
    pub provenance: Provenance,
    #[serde(default)]
    pub urls: PatentUrls,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub annotations: IndexMap<String, String>,
    pub extracted_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl PatentMetadata {
    /// Empty record for `identifier`; extractors fill in what they find.
    pub fn new(identifier: impl Into<String>, provenance: Provenance) -> Self {
        let identifier = identifier.into();
        let urls = derive_urls(&identifier);
        Self {
            identifier,
            title: String::new(),
            abstract_primary: String::new(),
            abstract_secondary: String::new(),
            inventors_primary: Vec::new(),
            inventors_secondary: Vec::new(),
            assignees_primary: Vec::new(),
            assignees_secondary: Vec::new(),
            priority_date: String::new(),
            filing_date: String::new(),
            publication_date: String::new(),
            country: String::new(),
            family_members: Vec::new(),
            claims: Some(Vec::new()),
            provenance,
            urls,
            annotations: IndexMap::new(),
            extracted_at: None,
            error: None,
        }
    }

    /// Record built from a successful primary extraction.
    pub fn from_primary(
        identifier: impl Into<String>,
        primary: PrimaryMetadata,
        provenance: Provenance,
    ) -> Self {
        let mut record = Self::new(identifier, provenance);
        record.title = primary.title;
        record.abstract_primary = primary.abstract_text;
        record.inventors_primary = primary.inventors;
        record.assignees_primary = primary.assignees;
        record.priority_date = primary.priority_date;
        record.filing_date = primary.filing_date;
        record.publication_date = primary.publication_date;
        record.country = primary.country;
        record.family_members = primary.family_members;
        record.extracted_at = Some(Utc::now());
        record
    }

    /// Stub retained for an identifier whose primary extraction failed.
    pub fn failed(
        identifier: impl Into<String>,
        provenance: Provenance,
        error: impl Into<String>,
    ) -> Self {
        let mut record = Self::new(identifier, provenance);
        record.error = Some(error.into());
        record.extracted_at = Some(Utc::now());
        record
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Merge enrichment output into the secondary fields.
    pub fn apply_secondary(&mut self, data: SecondaryData) {
        self.abstract_secondary = data.abstract_text;
        self.inventors_secondary = data.inventors;
        self.assignees_secondary = data.assignees;
        self.claims = data.claims;
    }

    /// Reset the secondary fields to empty values (never `null` claims).
    pub fn clear_secondary(&mut self) {
        self.apply_secondary(SecondaryData::default());
    }

    /// Jurisdiction used for summary counts: the extracted country, else the
    /// identifier's leading letters.
    pub fn country_key(&self) -> String {
        if !self.country.trim().is_empty() {
            return self.country.trim().to_ascii_uppercase();
        }
        family::country_prefix(&self.identifier)
            .map(|prefix| prefix.to_ascii_uppercase())
            .unwrap_or_else(|| "UNKNOWN".to_string())
    }
}

/// Fields returned by the primary metadata extractor. Dates are passed
/// through in source format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryMetadata {
    pub title: String,
    pub abstract_text: String,
    pub inventors: Vec<String>,
    pub assignees: Vec<String>,
    pub priority_date: String,
    pub filing_date: String,
    pub publication_date: String,
    pub country: String,
    pub family_members: Vec<String>,
}

/// Supplementary fields returned by the enrichment source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryData {
    pub abstract_text: String,
    pub inventors: Vec<String>,
    pub assignees: Vec<String>,
    pub claims: Option<Vec<String>>,
}

impl Default for SecondaryData {
    fn default() -> Self {
        Self {
            abstract_text: String::new(),
            inventors: Vec::new(),
            assignees: Vec::new(),
            claims: Some(Vec::new()),
        }
    }
}

impl SecondaryData {
    /// Short description for logs, e.g. `abstract (812 chars), 3 inventors`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.abstract_text.is_empty() {
            parts.push(format!("abstract ({} chars)", self.abstract_text.len()));
        }
        if !self.inventors.is_empty() {
            parts.push(format!("{} inventors", self.inventors.len()));
        }
        if !self.assignees.is_empty() {
            parts.push(format!("{} assignees", self.assignees.len()));
        }
        match &self.claims {
            Some(claims) if !claims.is_empty() => parts.push(format!("{} claims", claims.len())),
            None => parts.push("no claims section".to_string()),
            _ => {}
        }
        if parts.is_empty() {
            "no data".to_string()
        } else {
            parts.join(", ")
        }
    }
}
