//! Workflow types.

use serde::Serialize;
use thiserror::Error;

use crate::chat::ChatError;
use crate::helpdesk::HelpdeskError;
use crate::sheets::StoreError;

/// Progress of a ledger entry through the workflow. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Eligible,
    ClientResolved,
    TicketResolved,
    Notified,
}

impl WorkflowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::Eligible => "eligible",
            WorkflowStage::ClientResolved => "client_resolved",
            WorkflowStage::TicketResolved => "ticket_resolved",
            WorkflowStage::Notified => "notified",
        }
    }
}

/// Why an entry was not processed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Stored status is not the triggering one.
    StatusMismatch,
    /// Tax id, phone or name is empty.
    MissingFields,
    /// Ticket linked and notification confirmed.
    AlreadyProcessed,
}

/// Why an entry stopped early without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StallReason {
    /// No helpdesk client has the entry's phone.
    ClientNotFound,
    /// The client has no open ticket and creation is disabled.
    NoOpenTicket,
    /// No chat bot is configured.
    NotifierDisabled,
}

/// Result of one entry's pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Skipped(SkipReason),
    /// Stopped at `stage`; the next run picks it up from there.
    Stalled {
        stage: WorkflowStage,
        reason: StallReason,
    },
    Completed,
    /// An external call failed while at `stage`.
    Failed { stage: WorkflowStage, error: String },
}

impl EntryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            EntryOutcome::Skipped(_) => "skipped",
            EntryOutcome::Stalled { .. } => "stalled",
            EntryOutcome::Completed => "completed",
            EntryOutcome::Failed { .. } => "failed",
        }
    }
}

/// Errors raised by a single workflow step.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Ledger write failed: {0}")]
    Store(#[from] StoreError),

    #[error("Helpdesk call failed: {0}")]
    Helpdesk(#[from] HelpdeskError),

    #[error("Chat delivery failed: {0}")]
    Chat(#[from] ChatError),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },
}

/// Counters for one workflow pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowReport {
    /// Ledger entries looked at.
    pub entries: usize,
    pub skipped: usize,
    pub already_processed: usize,
    pub completed: usize,
    pub stalled: usize,
    pub failed: usize,
}

impl WorkflowReport {
    pub fn record(&mut self, outcome: &EntryOutcome) {
        self.entries += 1;
        match outcome {
            EntryOutcome::Skipped(SkipReason::AlreadyProcessed) => {
                self.skipped += 1;
                self.already_processed += 1;
            }
            EntryOutcome::Skipped(_) => self.skipped += 1,
            EntryOutcome::Stalled { .. } => self.stalled += 1,
            EntryOutcome::Completed => self.completed += 1,
            EntryOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_are_ordered() {
        assert!(WorkflowStage::Eligible < WorkflowStage::ClientResolved);
        assert!(WorkflowStage::ClientResolved < WorkflowStage::TicketResolved);
        assert!(WorkflowStage::TicketResolved < WorkflowStage::Notified);
    }

    #[test]
    fn test_report_counts_outcomes() {
        let mut report = WorkflowReport::default();
        report.record(&EntryOutcome::Completed);
        report.record(&EntryOutcome::Skipped(SkipReason::AlreadyProcessed));
        report.record(&EntryOutcome::Skipped(SkipReason::StatusMismatch));
        report.record(&EntryOutcome::Failed {
            stage: WorkflowStage::Eligible,
            error: "boom".to_string(),
        });

        assert_eq!(report.entries, 4);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.already_processed, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.stalled, 0);
    }
}
