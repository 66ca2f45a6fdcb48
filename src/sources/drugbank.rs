//! DrugBank seed fetcher: reads the patents table of a drug page.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, instrument, warn};
use urlencoding::encode;

use crate::{
    config::Settings,
    patents::{derive_urls, PatentUrls, SeedPatentRecord, SourceKind},
};

use super::{
    http::{element_text, http_client, selector},
    FetchError, RecordFetcher, SeedBatch,
};

const SOURCE_NAME: &str = "DrugBank";

static PATENT_ROWS: Lazy<Selector> = Lazy::new(|| selector("table#patents tbody tr"));
static CELL: Lazy<Selector> = Lazy::new(|| selector("td"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static HIDDEN_SPAN: Lazy<Selector> = Lazy::new(|| selector("span[hidden]"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));

/// Seed fetcher keyed by DrugBank accession (e.g. `DB05541`).
pub struct DrugbankFetcher {
    client: Client,
    base_url: String,
}

impl DrugbankFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings)?,
            base_url: settings.drugbank_base_url.clone(),
        })
    }

    fn drug_url(&self, drugbank_id: &str) -> String {
        format!("{}/drugs/{}", self.base_url, encode(drugbank_id.trim()))
    }
}

#[async_trait]
impl RecordFetcher for DrugbankFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Drugbank
    }

    #[instrument(skip(self))]
    async fn fetch(
        &self,
        search_key: &str,
        limit: Option<usize>,
    ) -> Result<SeedBatch, FetchError> {
        let url = self.drug_url(search_key);
        let resp = self.client.get(&url).send().await.map_err(|err| FetchError::Http {
            source_name: SOURCE_NAME,
            message: err.to_string(),
        })?;
        if !resp.status().is_success() {
            return Err(FetchError::Http {
                source_name: SOURCE_NAME,
                message: format!("unexpected status {} for {url}", resp.status()),
            });
        }
        let html = resp.text().await.map_err(|err| FetchError::Http {
            source_name: SOURCE_NAME,
            message: err.to_string(),
        })?;
        if html.contains("Just a moment") || html.contains("Checking your browser") {
            warn!(%url, "drugbank served a browser challenge page");
        }

        let mut batch = parse_drug_page(&html, search_key, &url);
        if let Some(limit) = limit {
            batch.records.truncate(limit);
        }
        if batch.records.is_empty() {
            return Err(FetchError::NoData {
                source_name: SOURCE_NAME,
                key: search_key.to_string(),
            });
        }
        info!(
            count = batch.records.len(),
            drug = ?batch.display_name,
            "fetched drugbank seed patents"
        );
        Ok(batch)
    }
}

/// Extract the drug name and patent rows from a drug page.
///
/// Rows need at least five cells: number (optionally linked), pediatric
/// extension, approval date, expiry date, country.
pub fn parse_drug_page(html: &str, drugbank_id: &str, page_url: &str) -> SeedBatch {
    let document = Html::parse_document(html);
    let display_name = drug_name(&document, drugbank_id);

    let records: Vec<SeedPatentRecord> = document
        .select(&PATENT_ROWS)
        .filter_map(|row| patent_row(row, page_url))
        .collect();
    if records.is_empty() {
        warn!(%drugbank_id, "no patent rows on drug page");
    }

    SeedBatch {
        display_name,
        records,
    }
}

fn patent_row(row: ElementRef<'_>, page_url: &str) -> Option<SeedPatentRecord> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
    if cells.len() < 5 {
        return None;
    }
    let identifier = element_text(cells[0]);
    if identifier.is_empty() {
        return None;
    }
    let link = cells[0]
        .select(&LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .unwrap_or_default();
    let country = cells[4]
        .select(&HIDDEN_SPAN)
        .next()
        .map(element_text)
        .unwrap_or_else(|| element_text(cells[4]));
    let urls = PatentUrls {
        google_patents: link,
        pubchem: String::new(),
    }
    .or_fill(derive_urls(&identifier));

    let mut seed = SeedPatentRecord::new(identifier);
    seed.source_urls = urls;
    Some(
        seed.with_annotation("pediatric_extension", element_text(cells[1]))
            .with_annotation("approved_date", element_text(cells[2]))
            .with_annotation("expires_date", element_text(cells[3]))
            .with_annotation("country", country)
            .with_annotation("drugbank_url", page_url),
    )
}

fn drug_name(document: &Html, drugbank_id: &str) -> Option<String> {
    let from_heading = document.select(&H1).next().map(|h1| {
        let text = element_text(h1);
        let name = text.split(drugbank_id).next().unwrap_or("");
        let name = name.split('(').next().unwrap_or("");
        name.trim().to_string()
    });
    if let Some(name) = from_heading.filter(|name| !name.is_empty()) {
        return Some(name);
    }
    document
        .select(&TITLE)
        .next()
        .map(|title| {
            let text = element_text(title);
            text.split('|').next().unwrap_or("").trim().to_string()
        })
        .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case("drugbank online"))
}
