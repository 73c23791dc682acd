//! Run controller.
//!
//! A run loads the source sheet, migrates and indexes the ledger, applies
//! reconciliation writes, re-reads the ledger, then runs the workflow over
//! every entry. Only failures loading the source or the ledger abort a run.

mod controller;
mod types;

pub use controller::RunController;
pub use types::{RunError, RunSummary};
