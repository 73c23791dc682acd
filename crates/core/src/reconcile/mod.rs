//! Source-to-ledger reconciliation.
//!
//! Walks the source records in order and works out the minimal ledger
//! writes: append rows for tax ids first seen in the triggering status,
//! and refresh the status and `updated_at` cells of known rows whose
//! status changed. Unchanged records produce no writes, which is what
//! makes repeated runs safe.

mod reconciler;
mod types;

pub use reconciler::Reconciler;
pub use types::{LedgerWrite, SyncReport};
