//! Types for ledger reconciliation.

use serde::Serialize;

use crate::ledger::LedgerColumn;

/// A single change to bring the ledger in line with the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite {
    /// New ledger row. `position` is where it is expected to land.
    Append {
        tax_id: String,
        position: usize,
        row: Vec<String>,
    },
    /// Overwrite one cell of an existing row.
    Cell {
        tax_id: String,
        position: usize,
        column: LedgerColumn,
        value: String,
    },
}

impl LedgerWrite {
    pub fn tax_id(&self) -> &str {
        match self {
            LedgerWrite::Append { tax_id, .. } | LedgerWrite::Cell { tax_id, .. } => tax_id,
        }
    }

    pub fn position(&self) -> usize {
        match self {
            LedgerWrite::Append { position, .. } | LedgerWrite::Cell { position, .. } => *position,
        }
    }

    /// Label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerWrite::Append { .. } => "append",
            LedgerWrite::Cell { column, .. } => column.as_str(),
        }
    }
}

/// Counters from applying reconciliation to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Source rows looked at.
    pub records: usize,
    /// Rows skipped because they were too short or had no tax id.
    pub ineligible: usize,
    pub appended: usize,
    pub status_updates: usize,
    pub timestamp_updates: usize,
    /// Writes the store rejected; the rest of that record's writes were skipped.
    pub failed_writes: usize,
}

impl SyncReport {
    pub fn total_writes(&self) -> usize {
        self.appended + self.status_updates + self.timestamp_updates
    }
}
