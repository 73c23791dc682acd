//! Tabular store abstraction.
//!
//! The source dataset and the ledger both live in a spreadsheet. This
//! module provides the `TableStore` trait and a Google Sheets backend
//! authenticated with a service-account key.

mod auth;
mod google;
mod types;

pub use auth::{ServiceAccountKey, SHEETS_SCOPE};
pub use google::GoogleSheetsStore;
pub use types::*;
