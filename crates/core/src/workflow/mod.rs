//! Per-entry workflow: client linkage, ticket resolution, notification.
//!
//! Each ledger entry in the triggering status moves forward through
//! [`WorkflowStage`]s. Progress lives only in the ledger: the `ticket_url`
//! cell is written once a ticket is resolved and the `notified` cell once
//! the chat confirms delivery. An entry that stops early is picked up again
//! on the next run from whatever the ledger shows.

mod driver;
mod selection;
mod types;

pub use driver::WorkflowDriver;
pub use selection::candidates;
pub use types::{
    EntryOutcome, SkipReason, StallReason, WorkflowError, WorkflowReport, WorkflowStage,
};
