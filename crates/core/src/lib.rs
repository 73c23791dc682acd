pub mod chat;
pub mod clock;
pub mod config;
pub mod helpdesk;
pub mod ledger;
pub mod metrics;
pub mod reconcile;
pub mod runner;
pub mod sheets;
pub mod testing;
pub mod workflow;

pub use chat::{ChatError, ChatTarget, Notifier, TelegramNotifier};
pub use clock::{CivilClock, Clock, FixedClock, TIMESTAMP_FORMAT};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    StatusChangePolicy, TicketPolicy,
};
pub use helpdesk::{Helpdesk, HelpdeskClient, HelpdeskError, UseDeskClient};
pub use ledger::{
    CodecError, HeaderIndex, LedgerColumn, LedgerEntry, LedgerIndex, LedgerSchema, Notified,
    SourceRecord,
};
pub use reconcile::{LedgerWrite, Reconciler, SyncReport};
pub use runner::{RunController, RunError, RunSummary};
pub use sheets::{GoogleSheetsStore, StoreError, TableStore};
pub use workflow::{
    EntryOutcome, SkipReason, StallReason, WorkflowDriver, WorkflowError, WorkflowReport,
    WorkflowStage,
};
