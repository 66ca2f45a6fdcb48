//! PubChem clients: compound patent search (seed source) and PUG View
//! patent records (primary metadata).

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use urlencoding::encode;

use crate::{
    config::Settings,
    patents::{PrimaryMetadata, SeedPatentRecord, SourceKind},
};

use super::{
    error::is_connect_failure, http::http_client, ExtractionError, FetchError, MetadataExtractor,
    RecordFetcher, SeedBatch,
};

const SOURCE_NAME: &str = "PubChem";
/// Upper bound PubChem accepts for a single download query.
const MAX_SEARCH_LIMIT: usize = 10_000_000;

/// Seed fetcher backed by PubChem's structured data query endpoint.
pub struct PubchemSearchFetcher {
    client: Client,
    base_url: String,
}

impl PubchemSearchFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings)?,
            base_url: settings.pubchem_base_url.clone(),
        })
    }

    fn search_url(&self, compound: &str, limit: usize) -> String {
        let query = search_query(compound, limit).to_string();
        format!(
            "{base}/sdq/sdqagent.cgi?infmt=json&outfmt=json&showcolumnDisplayname=1&query={query}",
            base = self.base_url,
            query = encode(&query),
        )
    }
}

/// SDQ query matching every whitespace separated word of `compound`.
pub fn search_query(compound: &str, limit: usize) -> Value {
    let ands: Vec<Value> = compound
        .split_whitespace()
        .map(|word| json!({ "*": word }))
        .collect();
    json!({
        "download": "*",
        "collection": "patent",
        "order": ["relevancescore,desc"],
        "start": 1,
        "limit": limit,
        "downloadfilename": format!("PubChem_patent_text_{}", compound.trim()),
        "where": { "ands": ands },
    })
}

#[async_trait]
impl RecordFetcher for PubchemSearchFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Pubchem
    }

    #[instrument(skip(self))]
    async fn fetch(
        &self,
        search_key: &str,
        limit: Option<usize>,
    ) -> Result<SeedBatch, FetchError> {
        let url = self.search_url(search_key, limit.unwrap_or(MAX_SEARCH_LIMIT));
        debug!(%url, "querying pubchem patent collection");
        let resp = self.client.get(&url).send().await.map_err(|err| FetchError::Http {
            source_name: SOURCE_NAME,
            message: err.to_string(),
        })?;
        if !resp.status().is_success() {
            return Err(FetchError::Http {
                source_name: SOURCE_NAME,
                message: format!("unexpected status {}", resp.status()),
            });
        }
        let payload: Value = resp.json().await.map_err(|err| FetchError::Parse {
            source_name: SOURCE_NAME,
            message: err.to_string(),
        })?;

        let mut records = parse_search_response(&payload);
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        if records.is_empty() {
            return Err(FetchError::NoData {
                source_name: SOURCE_NAME,
                key: search_key.to_string(),
            });
        }
        info!(count = records.len(), "fetched pubchem seed patents");
        Ok(SeedBatch {
            display_name: None,
            records,
        })
    }
}

/// Turn an SDQ JSON payload into seeds, keeping upstream order. Rows without
/// a publication number are skipped.
pub fn parse_search_response(payload: &Value) -> Vec<SeedPatentRecord> {
    let rows: Vec<&Value> = match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = ["data", "results", "records"]
                .iter()
                .find_map(|key| map.get(*key))
            {
                items.iter().collect()
            } else if let Some(Value::Array(sets)) = map.get("SDQOutputSet") {
                sets.iter()
                    .filter_map(|set| set.get("rows").and_then(Value::as_array))
                    .flatten()
                    .collect()
            } else if map.contains_key("publicationnumber") {
                vec![payload]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    };

    rows.into_iter()
        .filter_map(|row| {
            let number = row.get("publicationnumber")?.as_str()?.trim();
            if number.is_empty() {
                return None;
            }
            let mut seed = SeedPatentRecord::new(number);
            if let Some(title) = row.get("title").and_then(Value::as_str) {
                if !title.trim().is_empty() {
                    seed = seed.with_annotation("search_title", title.trim());
                }
            }
            Some(seed)
        })
        .collect()
}

/// Primary metadata extractor backed by the PUG View patent JSON API.
pub struct PubchemExtractor {
    client: Client,
    base_url: String,
    delay: Duration,
}

impl PubchemExtractor {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings)?,
            base_url: settings.pubchem_base_url.clone(),
            delay: settings.request_delay(),
        })
    }

    fn record_url(&self, identifier: &str) -> String {
        format!(
            "{base}/rest/pug_view/data/patent/{id}/JSON/",
            base = self.base_url,
            id = encode(identifier.trim()),
        )
    }
}

#[async_trait]
impl MetadataExtractor for PubchemExtractor {
    #[instrument(skip(self))]
    async fn extract(&self, identifier: &str) -> Result<PrimaryMetadata, ExtractionError> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        let url = self.record_url(identifier);
        let resp = self.client.get(&url).send().await.map_err(|err| {
            if is_connect_failure(&err) {
                ExtractionError::Unavailable(err.to_string())
            } else {
                ExtractionError::Http(err.to_string())
            }
        })?;
        match resp.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(ExtractionError::NotFound {
                    identifier: identifier.to_string(),
                })
            }
            status => {
                warn!(%status, %url, "pug view request rejected");
                return Err(ExtractionError::Http(format!("unexpected status {status}")));
            }
        }
        let body = resp
            .text()
            .await
            .map_err(|err| ExtractionError::Http(err.to_string()))?;
        parse_pug_view(&body)
    }
}

/// Parse a PUG View patent document into primary metadata.
pub fn parse_pug_view(body: &str) -> Result<PrimaryMetadata, ExtractionError> {
    let doc: PugViewDocument =
        serde_json::from_str(body).map_err(|err| ExtractionError::Parse(err.to_string()))?;
    let record = doc.record;
    let sections = &record.sections;

    let dates = find_section(sections, "Important Dates").map(|s| s.sections.as_slice());
    let date = |heading: &str| {
        dates
            .and_then(|subs| find_section(subs, heading))
            .and_then(Section::first_date)
            .unwrap_or_default()
    };

    Ok(PrimaryMetadata {
        title: record.title.unwrap_or_default(),
        abstract_text: find_section(sections, "Abstract")
            .and_then(Section::first_string)
            .unwrap_or_default(),
        inventors: find_section(sections, "Inventor")
            .map(Section::strings)
            .unwrap_or_default(),
        assignees: find_section(sections, "Assignee")
            .map(Section::strings)
            .unwrap_or_default(),
        priority_date: date("Priority Date"),
        filing_date: date("Filing Date"),
        publication_date: date("Publication Date"),
        country: find_section(sections, "Country")
            .and_then(Section::first_string)
            .unwrap_or_default(),
        family_members: find_section(sections, "Patent Family")
            .map(Section::strings)
            .unwrap_or_default(),
    })
}

fn find_section<'a>(sections: &'a [Section], heading: &str) -> Option<&'a Section> {
    sections.iter().find(|s| s.heading == heading)
}

#[derive(Debug, Deserialize)]
struct PugViewDocument {
    #[serde(rename = "Record")]
    record: Record,
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(rename = "RecordTitle")]
    title: Option<String>,
    #[serde(rename = "Section", default)]
    sections: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Section {
    #[serde(rename = "TOCHeading", default)]
    heading: String,
    #[serde(rename = "Information", default)]
    information: Vec<Information>,
    #[serde(rename = "Section", default)]
    sections: Vec<Section>,
}

impl Section {
    fn first_value(&self) -> Option<&InfoValue> {
        self.information.first().map(|info| &info.value)
    }

    fn first_string(&self) -> Option<String> {
        self.first_value()?
            .markup
            .first()
            .map(|m| m.string.trim().to_string())
    }

    fn strings(&self) -> Vec<String> {
        self.first_value()
            .map(|value| {
                value
                    .markup
                    .iter()
                    .map(|m| m.string.trim())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn first_date(&self) -> Option<String> {
        self.first_value()?.dates.first().cloned()
    }
}

#[derive(Debug, Deserialize)]
struct Information {
    #[serde(rename = "Value", default)]
    value: InfoValue,
}

#[derive(Debug, Default, Deserialize)]
struct InfoValue {
    #[serde(rename = "StringWithMarkup", default)]
    markup: Vec<Markup>,
    #[serde(rename = "DateISO8601", default)]
    dates: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Markup {
    #[serde(rename = "String", default)]
    string: String,
}
