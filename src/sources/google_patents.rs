//! Google Patents enrichment: abstract, inventors, assignees and claims read
//! from the public patent page.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use tokio::time::sleep;
use tracing::{debug, info, instrument};

use crate::{
    config::Settings,
    patents::{urls::GOOGLE_PATENTS_BASE, SecondaryData},
};

use super::{
    error::is_connect_failure,
    http::{block_text, collapse_whitespace, element_text, http_client, selector},
    EnrichmentError, EnrichmentSession, SecondaryEnricher,
};

static ABSTRACT: Lazy<Selector> = Lazy::new(|| selector("div.abstract"));
static META: Lazy<Selector> = Lazy::new(|| selector("meta[name]"));
static ITEMPROP_DD: Lazy<Selector> = Lazy::new(|| selector("dd[itemprop]"));
static CLAIMS: Lazy<Selector> = Lazy::new(|| selector("section[itemprop='claims']"));

/// Opens plain HTTP sessions against Google Patents.
pub struct GooglePatentsEnricher {
    settings: Settings,
}

impl GooglePatentsEnricher {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }
}

#[async_trait]
impl SecondaryEnricher for GooglePatentsEnricher {
    async fn open_session(&self) -> Result<Box<dyn EnrichmentSession>, EnrichmentError> {
        let client = http_client(&self.settings)
            .map_err(|err| EnrichmentError::Unavailable(err.to_string()))?;
        info!("opened google patents session");
        Ok(Box::new(GooglePatentsSession {
            client,
            base_url: format!("{}/patent", self.settings.google_patents_base_url),
            delay: self.settings.request_delay(),
            pages: 0,
        }))
    }
}

struct GooglePatentsSession {
    client: Client,
    base_url: String,
    delay: Duration,
    pages: usize,
}

#[async_trait]
impl EnrichmentSession for GooglePatentsSession {
    #[instrument(skip(self))]
    async fn enrich(
        &mut self,
        identifier: &str,
        url: &str,
    ) -> Result<SecondaryData, EnrichmentError> {
        if self.pages > 0 && !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.pages += 1;
        let url = rebase(url, &self.base_url);
        let resp = self.client.get(&url).send().await.map_err(|err| {
            if is_connect_failure(&err) {
                EnrichmentError::Unavailable(err.to_string())
            } else {
                EnrichmentError::Transport(err.to_string())
            }
        })?;
        match resp.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                debug!(%url, "no google patents page");
                return Ok(SecondaryData {
                    claims: None,
                    ..SecondaryData::default()
                });
            }
            status => {
                return Err(EnrichmentError::Transport(format!(
                    "unexpected status {status} for {url}"
                )))
            }
        }
        let html = resp
            .text()
            .await
            .map_err(|err| EnrichmentError::Transport(err.to_string()))?;
        Ok(parse_patent_page(&html))
    }

    async fn close(self: Box<Self>) {
        info!(pages = self.pages, "closed google patents session");
    }
}

/// Point a derived page URL at the configured host.
fn rebase(url: &str, base_url: &str) -> String {
    match url.strip_prefix(GOOGLE_PATENTS_BASE) {
        Some(rest) if base_url != GOOGLE_PATENTS_BASE => format!("{base_url}{rest}"),
        _ => url.to_string(),
    }
}

/// Pull the enrichment fields out of a Google Patents page.
pub fn parse_patent_page(html: &str) -> SecondaryData {
    let document = Html::parse_document(html);
    let metas = meta_tags(&document);

    let abstract_text = document
        .select(&ABSTRACT)
        .map(element_text)
        .find(|text| !text.is_empty())
        .or_else(|| {
            metas
                .iter()
                .find(|m| m.name.eq_ignore_ascii_case("DC.description"))
                .map(|m| m.content.clone())
        })
        .unwrap_or_default();

    let inventors = people(&document, &metas, &["inventor"], "inventor");
    let assignees = people(
        &document,
        &metas,
        &["assigneeOriginal", "assigneeCurrent"],
        "assignee",
    );

    let claims = document
        .select(&CLAIMS)
        .next()
        .map(|section| split_numbered_claims(&block_text(section)));

    SecondaryData {
        abstract_text,
        inventors,
        assignees,
        claims,
    }
}

/// Split claim text on its running numbering (`1. ... 2. ...`). Text without
/// numbering becomes a single claim; empty text gives no claims.
pub fn split_numbered_claims(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let mut starts = Vec::new();
    let mut cursor = 0;
    let mut number = 1usize;
    while let Some(pos) = find_claim_marker(text, number, cursor) {
        starts.push(pos);
        cursor = pos + 1;
        number += 1;
    }
    if starts.is_empty() {
        return vec![text.to_string()];
    }
    starts
        .iter()
        .enumerate()
        .map(|(idx, &start)| {
            let end = starts.get(idx + 1).copied().unwrap_or(text.len());
            text[start..end].trim().to_string()
        })
        .filter(|claim| !claim.is_empty())
        .collect()
}

fn find_claim_marker(text: &str, number: usize, from: usize) -> Option<usize> {
    let marker = format!("{number}. ");
    let mut offset = from;
    while let Some(found) = text.get(offset..)?.find(&marker) {
        let pos = offset + found;
        let at_boundary = text[..pos]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        if at_boundary {
            return Some(pos);
        }
        offset = pos + marker.len();
    }
    None
}

#[derive(Debug)]
struct MetaTag {
    name: String,
    scheme: String,
    content: String,
}

fn meta_tags(document: &Html) -> Vec<MetaTag> {
    document
        .select(&META)
        .map(|tag| {
            let attr = |name: &str| collapse_whitespace(tag.value().attr(name).unwrap_or(""));
            MetaTag {
                name: attr("name"),
                scheme: attr("scheme"),
                content: attr("content"),
            }
        })
        .collect()
}

/// Names tagged with one of `itemprops`, falling back to `DC.contributor`
/// meta tags with the given scheme. Order preserved, duplicates dropped.
fn people(document: &Html, metas: &[MetaTag], itemprops: &[&str], scheme: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for dd in document.select(&ITEMPROP_DD) {
        let itemprop = dd.value().attr("itemprop").unwrap_or("");
        if itemprops.iter().any(|p| itemprop.eq_ignore_ascii_case(p)) {
            push_unique(&mut names, element_text(dd));
        }
    }
    if names.is_empty() {
        for meta in metas {
            if meta.name.eq_ignore_ascii_case("DC.contributor")
                && meta.scheme.eq_ignore_ascii_case(scheme)
            {
                push_unique(&mut names, meta.content.clone());
            }
        }
    }
    names
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !name.is_empty() && !names.contains(&name) {
        names.push(name);
    }
}
