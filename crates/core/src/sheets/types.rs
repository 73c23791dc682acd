//! Types for the tabular store.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur talking to the tabular store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid credentials: {0}")]
    Credentials(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Store connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Store API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse store response: {0}")]
    ParseError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StoreError::Timeout
        } else if e.is_decode() {
            StoreError::ParseError(e.to_string())
        } else {
            StoreError::ConnectionFailed(e.to_string())
        }
    }
}

/// Row/cell access to a spreadsheet-like store.
///
/// Rows and columns are 1-based; row 1 is the header.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Every row of the sheet in order, header first. Rows may be ragged.
    async fn read_all_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, StoreError>;

    /// Append a row after the last non-empty row.
    ///
    /// Returns the position the row landed on when the backend reports it.
    async fn append_row(&self, sheet: &str, row: &[String]) -> Result<Option<usize>, StoreError>;

    /// Overwrite a single cell.
    async fn update_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        value: &str,
    ) -> Result<(), StoreError>;

    /// Replace row 1 with the given header.
    async fn write_header(&self, sheet: &str, header: &[String]) -> Result<(), StoreError>;
}
