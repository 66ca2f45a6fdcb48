//! Shared HTTP client construction and HTML text helpers for upstream
//! sources.

use anyhow::Result;
use reqwest::Client;
use scraper::{ElementRef, Node, Selector};

use crate::config::Settings;

/// Browser-like agent; PubChem and DrugBank reject bare library agents.
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) ",
    "Chrome/120.0.0.0 Safari/537.36 patent-harvest/",
    env!("CARGO_PKG_VERSION")
);

pub fn http_client(settings: &Settings) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(settings.http_timeout())
        .gzip(true)
        .brotli(true)
        .build()?)
}

/// Parse a selector written into the source.
pub fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Text content of `element` with whitespace collapsed. Entities are
/// already decoded by the parser.
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

const BLOCK_TAGS: &[&str] = &[
    "br", "dd", "div", "dt", "h1", "h2", "h3", "h4", "li", "ol", "p", "section", "td", "tr", "ul",
];

/// Like [`element_text`], but block children are kept apart by a space so
/// sibling paragraphs do not run together.
pub fn block_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if BLOCK_TAGS.contains(&el.name()) => out.push(' '),
            _ => {}
        }
    }
    collapse_whitespace(&out)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
