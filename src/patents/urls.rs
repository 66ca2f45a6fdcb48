//! Deterministic mapping from a raw patent identifier to page URLs.

use serde::{Deserialize, Serialize};

pub const GOOGLE_PATENTS_BASE: &str = "https://patents.google.com/patent";
pub const PUBCHEM_PATENT_BASE: &str = "https://pubchem.ncbi.nlm.nih.gov/patent";

/// Page URLs for one patent. Empty strings mean "not derivable".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatentUrls {
    /// Google Patents page; expects the compact form (`WO2024184281A1`).
    pub google_patents: String,
    /// PubChem patent record; expects the dashed form (`WO-2024184281-A1`).
    pub pubchem: String,
}

impl PatentUrls {
    pub fn is_empty(&self) -> bool {
        self.google_patents.is_empty() && self.pubchem.is_empty()
    }

    /// Keep our own URLs and fill the blank ones from `fallback`.
    pub fn or_fill(mut self, fallback: PatentUrls) -> Self {
        if self.google_patents.trim().is_empty() {
            self.google_patents = fallback.google_patents;
        }
        if self.pubchem.trim().is_empty() {
            self.pubchem = fallback.pubchem;
        }
        self
    }
}

/// Derive both URLs for `identifier`. Total: blank input gives blank URLs.
pub fn derive_urls(identifier: &str) -> PatentUrls {
    PatentUrls {
        google_patents: google_patents_url(identifier),
        pubchem: pubchem_url(identifier),
    }
}

/// Identifier with hyphens, spaces and underscores removed.
pub fn compact_identifier(identifier: &str) -> String {
    identifier
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | ' ' | '_'))
        .collect()
}

pub fn google_patents_url(identifier: &str) -> String {
    let compact = compact_identifier(identifier);
    if compact.is_empty() {
        return String::new();
    }
    format!("{GOOGLE_PATENTS_BASE}/{compact}/en")
}

pub fn pubchem_url(identifier: &str) -> String {
    let canonical = identifier.trim();
    if canonical.is_empty() {
        return String::new();
    }
    format!("{PUBCHEM_PATENT_BASE}/{canonical}")
}
