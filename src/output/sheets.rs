//! Google Sheets export through the Sheets v4 REST API.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use urlencoding::encode;

use crate::{
    config::Settings,
    pipeline::ConsolidatedResult,
    sources::http::http_client,
};

use super::{record_row, ExportHandle, ExternalExporter, OutputError, RECORD_COLUMNS};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
/// Sheets rejects cells longer than this.
const MAX_CELL_CHARS: usize = 50_000;

pub struct SheetsExporter {
    client: Client,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
    spreadsheet_url: Option<String>,
}

impl SheetsExporter {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings)?,
            token: settings.sheets_token.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    async fn create(&self, token: &str, title: &str) -> Result<CreatedSpreadsheet, OutputError> {
        let body = json!({
            "properties": { "title": title },
            "sheets": [
                { "properties": { "title": "Patents" } },
                { "properties": { "title": "Summary" } },
            ],
        });
        let resp = self
            .client
            .post(SHEETS_API)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(export_err)?;
        if !resp.status().is_success() {
            return Err(OutputError::Export(format!(
                "create spreadsheet returned {}",
                resp.status()
            )));
        }
        resp.json().await.map_err(export_err)
    }

    async fn write_values(
        &self,
        token: &str,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), OutputError> {
        let url = format!(
            "{SHEETS_API}/{spreadsheet_id}/values/{range}?valueInputOption=RAW",
            range = encode(range)
        );
        let resp = self
            .client
            .put(&url)
            .bearer_auth(token)
            .json(&json!({ "range": range, "values": rows }))
            .send()
            .await
            .map_err(export_err)?;
        if !resp.status().is_success() {
            return Err(OutputError::Export(format!(
                "writing {range} returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ExternalExporter for SheetsExporter {
    #[instrument(skip(self, result))]
    async fn export_external(
        &self,
        result: &ConsolidatedResult,
        display_name: &str,
    ) -> Result<Option<ExportHandle>, OutputError> {
        let Some(token) = self.token.as_deref() else {
            return Ok(None);
        };
        let title = format!(
            "Patents - {display_name} - {}",
            Utc::now().format("%Y-%m-%d %H:%M")
        );
        let created = self.create(token, &title).await?;

        let mut rows: Vec<Vec<String>> =
            vec![RECORD_COLUMNS.iter().map(|c| c.to_string()).collect()];
        rows.extend(result.records.iter().map(|record| {
            record_row(record)
                .into_iter()
                .map(|cell| truncate_cell(&cell))
                .collect()
        }));
        self.write_values(token, &created.spreadsheet_id, "Patents!A1", rows)
            .await?;
        self.write_values(
            token,
            &created.spreadsheet_id,
            "Summary!A1",
            summary_rows(result, display_name),
        )
        .await?;

        let url = created.spreadsheet_url.unwrap_or_else(|| {
            format!(
                "https://docs.google.com/spreadsheets/d/{}",
                created.spreadsheet_id
            )
        });
        info!(%url, "exported to google sheets");
        Ok(Some(ExportHandle {
            url,
            export_id: created.spreadsheet_id,
        }))
    }
}

fn summary_rows(result: &ConsolidatedResult, display_name: &str) -> Vec<Vec<String>> {
    let summary = &result.summary;
    let mut rows = vec![
        vec!["search".to_string(), display_name.to_string()],
        vec!["total patents".to_string(), summary.total.to_string()],
        vec!["seed patents".to_string(), summary.seed_count.to_string()],
        vec!["family patents".to_string(), summary.family_count.to_string()],
        vec![
            "duplicates removed".to_string(),
            summary.duplicates_removed.to_string(),
        ],
        vec!["errors".to_string(), summary.error_count.to_string()],
    ];
    rows.extend(
        summary
            .per_country_counts
            .iter()
            .map(|(country, count)| vec![format!("country {country}"), count.to_string()]),
    );
    rows
}

/// Clip `cell` to the Sheets cell limit on a char boundary.
pub fn truncate_cell(cell: &str) -> String {
    match cell.char_indices().nth(MAX_CELL_CHARS) {
        Some((idx, _)) => cell[..idx].to_string(),
        None => cell.to_string(),
    }
}

fn export_err(err: reqwest::Error) -> OutputError {
    OutputError::Export(err.to_string())
}
