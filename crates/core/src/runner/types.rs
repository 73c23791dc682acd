//! Run controller types.

use serde::Serialize;
use thiserror::Error;

use crate::ledger::CodecError;
use crate::reconcile::SyncReport;
use crate::sheets::StoreError;
use crate::workflow::WorkflowReport;

/// Errors that abort a whole run.
///
/// Everything past loading the source and the ledger is best-effort per
/// entry and never surfaces here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to read sheet '{sheet}': {source}")]
    Read {
        sheet: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to migrate ledger header: {0}")]
    Header(#[source] StoreError),

    #[error("Invalid source header: {0}")]
    Codec(#[from] CodecError),

    #[error("Invalid run configuration: {0}")]
    Config(String),
}

/// What one run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    /// Civil time the run started.
    pub started_at: String,
    pub dry_run: bool,
    /// Source data rows, header excluded.
    pub source_rows: usize,
    pub header_migrated: bool,
    pub sync: SyncReport,
    /// Writes computed in dry-run mode; zero otherwise.
    pub planned_writes: usize,
    /// Ledger entries after sync.
    pub ledger_entries: usize,
    pub workflow: WorkflowReport,
    /// Entries the workflow would process, in dry-run mode.
    pub pending_entries: usize,
    pub duration_ms: u64,
}
