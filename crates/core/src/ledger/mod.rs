//! The target ledger: row codec, column layout and the per-run index.
//!
//! The ledger is the only state that survives between runs. Every source
//! column is copied verbatim, followed by `added_at`, `updated_at`,
//! `ticket_url` and `notified`. Positions are 1-based sheet rows with the
//! header on row 1, matching how the store addresses cells.

mod codec;
mod index;
mod schema;

pub use codec::{extract_position, normalize_phone, CodecError, HeaderIndex, SourceRecord};
pub use index::{LedgerEntry, LedgerIndex, Notified};
pub use schema::{LedgerColumn, LedgerSchema, LEDGER_COLUMNS};
