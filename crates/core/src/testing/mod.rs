//! Testing utilities and mock implementations.
//!
//! This module provides in-memory implementations of the store, helpdesk and
//! chat traits, so a full run can be exercised without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use esfwatch_core::testing::{fixtures, MockHelpdesk, MockNotifier, MockTableStore};
//!
//! let store = MockTableStore::new();
//! let helpdesk = MockHelpdesk::new();
//! let notifier = MockNotifier::new();
//!
//! store.set_rows("unique drivers main", fixtures::source_rows(&[/* rows */])).await;
//! helpdesk.add_client(10, "77011112233", &[555]).await;
//! ```

mod mock_helpdesk;
mod mock_notifier;
mod mock_table_store;

pub use mock_helpdesk::{HelpdeskCall, MockHelpdesk};
pub use mock_notifier::{MockNotifier, SentMessage};
pub use mock_table_store::{MockTableStore, RecordedCellUpdate};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::config::{load_config_from_str, Config};

    pub const SOURCE_SHEET: &str = "unique drivers main";
    pub const LEDGER_SHEET: &str = "NO_REQUIRED_PERMISSIONS";
    pub const TRIGGER: &str = "NO_REQUIRED_PERMISSIONS";

    /// A valid configuration with dummy secrets and the default sheet names.
    pub fn test_config() -> Config {
        let mut config = load_config_from_str(
            r#"
[sheets]
spreadsheet_id = "test-spreadsheet"
credentials = "{}"

[helpdesk]
api_token = "test-token"

[chat]
bot_token = "123:abc"
chat_id = "-1001234567890"
thread_id = 8282
"#,
        )
        .unwrap_or_else(|e| panic!("test config must parse: {}", e));
        config.workflow.channel_id = Some("1".to_string());
        config
    }

    /// Source header with the default column names plus a passthrough column.
    pub fn source_header() -> Vec<String> {
        strings(&["tin", "name", "phone", "Статус ЭСФ", "city"])
    }

    /// One source row in [`source_header`] layout.
    pub fn source_row(tax_id: &str, name: &str, phone: &str, status: &str) -> Vec<String> {
        strings(&[tax_id, name, phone, status, "Almaty"])
    }

    /// Header followed by `rows`.
    pub fn source_rows(rows: &[Vec<String>]) -> Vec<Vec<String>> {
        let mut all = vec![source_header()];
        all.extend(rows.iter().cloned());
        all
    }

    /// Ledger header matching [`source_header`].
    pub fn ledger_header() -> Vec<String> {
        let mut header = source_header();
        header.extend(strings(&["added_at", "updated_at", "ticket_url", "notified"]));
        header
    }

    pub fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }
}
