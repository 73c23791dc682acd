//! Google Sheets v4 implementation of [`TableStore`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gcp_auth::TokenProvider;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::SheetsConfig;

use super::auth::{ServiceAccountKey, SHEETS_SCOPE};
use super::{StoreError, TableStore};

/// Raw writes: cell text is stored as given, so tax ids keep leading zeros.
const VALUE_INPUT_OPTION: &str = "RAW";

/// Sheets-backed table store.
pub struct GoogleSheetsStore {
    client: Client,
    api_url: String,
    spreadsheet_id: String,
    auth: Arc<dyn TokenProvider>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_range: Option<String>,
}

impl GoogleSheetsStore {
    /// Create a store from configuration, parsing the credentials in memory.
    pub fn new(config: &SheetsConfig) -> Result<Self, StoreError> {
        let key = ServiceAccountKey::parse(&config.credentials)?
            .with_default_token_uri(&config.token_url);
        debug!(account = %key.client_email, "Loaded service-account key");
        let auth = key.into_provider()?;
        let timeout = Duration::from_secs(config.timeout_secs as u64);
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            auth,
        })
    }

    fn values_url(&self, range: &str, action: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}{}",
            self.api_url,
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(range),
            action
        )
    }

    /// Attach a token, send, and map error statuses.
    async fn send(&self, request: RequestBuilder, sheet: &str) -> Result<Response, StoreError> {
        let token = self
            .auth
            .token(&[SHEETS_SCOPE])
            .await
            .map_err(|e| StoreError::Auth(format!("Failed to obtain access token: {}", e)))?;
        let response = request.bearer_auth(token.as_str()).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == 401 {
            warn!("Sheets API rejected the access token");
            return Err(StoreError::Auth(format!("HTTP 401: {}", truncate(&body))));
        }
        if status == 400 && body.contains("Unable to parse range") {
            return Err(StoreError::SheetNotFound(sheet.to_string()));
        }
        Err(StoreError::ApiError {
            status: status.as_u16(),
            message: truncate(&body),
        })
    }
}

#[async_trait]
impl TableStore for GoogleSheetsStore {
    fn name(&self) -> &str {
        "google_sheets"
    }

    async fn read_all_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let url = self.values_url(&quote_sheet(sheet), "");
        let request = self.client.get(&url).query(&[("majorDimension", "ROWS")]);
        let response = self.send(request, sheet).await?;

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| StoreError::ParseError(format!("Failed to parse values: {}", e)))?;

        debug!(sheet = sheet, rows = range.values.len(), "Read sheet");

        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn append_row(&self, sheet: &str, row: &[String]) -> Result<Option<usize>, StoreError> {
        let url = self.values_url(&quote_sheet(sheet), ":append");
        let request = self
            .client
            .post(&url)
            .query(&[
                ("valueInputOption", VALUE_INPUT_OPTION),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": [row] }));
        let response = self.send(request, sheet).await?;

        let append: AppendResponse = response
            .json()
            .await
            .map_err(|e| StoreError::ParseError(format!("Failed to parse append response: {}", e)))?;

        let position = append
            .updates
            .and_then(|u| u.updated_range)
            .and_then(|range| first_row_of_range(&range));
        debug!(sheet = sheet, position = ?position, "Appended row");
        Ok(position)
    }

    async fn update_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        value: &str,
    ) -> Result<(), StoreError> {
        let range = format!("{}!{}{}", quote_sheet(sheet), column_letter(col), row);
        let url = self.values_url(&range, "");
        let request = self
            .client
            .put(&url)
            .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
            .json(&json!({ "values": [[value]] }));
        self.send(request, sheet).await?;

        debug!(sheet = sheet, range = %range, "Updated cell");
        Ok(())
    }

    async fn write_header(&self, sheet: &str, header: &[String]) -> Result<(), StoreError> {
        // Clear the whole first row so a longer stale header leaves nothing behind.
        let clear_url = self.values_url(&format!("{}!1:1", quote_sheet(sheet)), ":clear");
        self.send(self.client.post(&clear_url).json(&json!({})), sheet)
            .await?;

        let url = self.values_url(&format!("{}!A1", quote_sheet(sheet)), "");
        let request = self
            .client
            .put(&url)
            .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
            .json(&json!({ "values": [header] }));
        self.send(request, sheet).await?;
        Ok(())
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

/// Quote a sheet name for A1 notation, doubling embedded quotes.
fn quote_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// 1-based column number to letters: 1 -> A, 27 -> AA.
fn column_letter(mut col: usize) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Row number of the first cell in an A1 range such as `'Sheet'!A15:H15`.
fn first_row_of_range(range: &str) -> Option<usize> {
    let (_, cells) = range.rsplit_once('!')?;
    let first = cells.split(':').next()?;
    let digits: String = first.chars().skip_while(|c| c.is_ascii_alphabetic()).collect();
    digits.parse().ok()
}

fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
