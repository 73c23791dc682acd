//! In-memory index of the ledger, keyed by tax id.

use std::collections::HashMap;

use tracing::warn;

use super::codec::{cell, normalize_phone, HeaderIndex};
use super::schema::{LedgerColumn, LedgerSchema};

/// Notification marker stored in the `notified` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Notified {
    #[default]
    Empty,
    Sent,
}

impl Notified {
    /// Only the configured marker (case-insensitive) counts as sent; any
    /// other value leaves the entry eligible for another attempt.
    pub fn from_cell(value: &str, marker: &str) -> Self {
        if !value.is_empty() && value.trim().to_lowercase() == marker.trim().to_lowercase() {
            Notified::Sent
        } else {
            Notified::Empty
        }
    }
}

/// Snapshot of one ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// 1-based sheet row; the header is row 1.
    pub position: usize,
    pub tax_id: String,
    pub name: String,
    pub phone: String,
    pub status: String,
    pub added_at: String,
    pub updated_at: String,
    pub ticket_url: String,
    pub notified: Notified,
}

impl LedgerEntry {
    fn from_row(
        position: usize,
        row: &[String],
        index: &HeaderIndex,
        schema: &LedgerSchema,
        notified_marker: &str,
    ) -> Self {
        Self {
            position,
            tax_id: cell(row, index.tax_id).to_string(),
            name: cell(row, index.name).to_string(),
            phone: normalize_phone(cell(row, index.phone)),
            status: cell(row, index.status).to_string(),
            added_at: cell(row, schema.offset(LedgerColumn::AddedAt)).to_string(),
            updated_at: cell(row, schema.offset(LedgerColumn::UpdatedAt)).to_string(),
            ticket_url: cell(row, schema.offset(LedgerColumn::TicketUrl)).to_string(),
            notified: Notified::from_cell(
                cell(row, schema.offset(LedgerColumn::Notified)),
                notified_marker,
            ),
        }
    }

    /// Ticket linked and notification confirmed: nothing left to do.
    pub fn is_fully_processed(&self) -> bool {
        !self.ticket_url.is_empty() && self.notified == Notified::Sent
    }
}

/// Mapping tax id -> ledger row, built from a full read of the ledger.
#[derive(Debug, Clone, Default)]
pub struct LedgerIndex {
    entries: HashMap<String, LedgerEntry>,
    row_count: usize,
}

impl LedgerIndex {
    /// Build from every row of the ledger, header included at `rows[0]`.
    ///
    /// Rows without a tax id still occupy a position. If a tax id repeats,
    /// the later row wins.
    pub fn build(
        rows: &[Vec<String>],
        index: &HeaderIndex,
        schema: &LedgerSchema,
        notified_marker: &str,
    ) -> Self {
        let mut entries: HashMap<String, LedgerEntry> = HashMap::new();

        for (offset, row) in rows.iter().enumerate().skip(1) {
            let position = offset + 1;
            let entry = LedgerEntry::from_row(position, row, index, schema, notified_marker);
            if entry.tax_id.is_empty() {
                continue;
            }
            if let Some(previous) = entries.get(&entry.tax_id) {
                warn!(
                    tax_id = %entry.tax_id,
                    first_row = previous.position,
                    row = position,
                    "Duplicate tax id in ledger, using the later row"
                );
            }
            entries.insert(entry.tax_id.clone(), entry);
        }

        Self {
            entries,
            row_count: rows.len(),
        }
    }

    pub fn get(&self, tax_id: &str) -> Option<&LedgerEntry> {
        self.entries.get(tax_id)
    }

    pub fn contains(&self, tax_id: &str) -> bool {
        self.entries.contains_key(tax_id)
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows in the ledger, header included.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Position the next appended row is expected to land on.
    pub fn next_position(&self) -> usize {
        self.row_count.max(1) + 1
    }

    /// Entries in sheet order.
    pub fn entries(&self) -> Vec<&LedgerEntry> {
        let mut entries: Vec<&LedgerEntry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.position);
        entries
    }

    /// Record a row that was just appended.
    pub fn insert(&mut self, entry: LedgerEntry) {
        self.row_count = self.row_count.max(entry.position);
        self.entries.insert(entry.tax_id.clone(), entry);
    }

    /// Reflect a status cell write in the snapshot.
    pub fn set_status(&mut self, tax_id: &str, status: &str) {
        if let Some(entry) = self.entries.get_mut(tax_id) {
            entry.status = status.to_string();
        }
    }

    /// Reflect an `updated_at` cell write in the snapshot.
    pub fn set_updated_at(&mut self, tax_id: &str, updated_at: &str) {
        if let Some(entry) = self.entries.get_mut(tax_id) {
            entry.updated_at = updated_at.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnsConfig;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn setup() -> (HeaderIndex, LedgerSchema) {
        let source = strings(&["tin", "name", "phone", "Статус ЭСФ"]);
        let index = HeaderIndex::resolve(&source, &ColumnsConfig::default()).unwrap();
        let schema = LedgerSchema::new(&source, &index);
        (index, schema)
    }

    #[test]
    fn test_build_positions_count_header() {
        let (index, schema) = setup();
        let rows = vec![
            schema.header().to_vec(),
            strings(&["111", "A", "+7 700", "S", "2024-01-01 00:00:00"]),
            strings(&["222", "B", "7701", "S", "", "", "https://x/tickets/5", "отправлено"]),
        ];

        let ledger = LedgerIndex::build(&rows, &index, &schema, "отправлено");
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.row_count(), 3);
        assert_eq!(ledger.next_position(), 4);

        let first = ledger.get("111").unwrap();
        assert_eq!(first.position, 2);
        assert_eq!(first.phone, "7700");
        assert_eq!(first.added_at, "2024-01-01 00:00:00");
        assert_eq!(first.notified, Notified::Empty);
        assert!(!first.is_fully_processed());

        let second = ledger.get("222").unwrap();
        assert_eq!(second.position, 3);
        assert_eq!(second.ticket_url, "https://x/tickets/5");
        assert_eq!(second.notified, Notified::Sent);
        assert!(second.is_fully_processed());
    }

    #[test]
    fn test_build_skips_blank_keys_but_keeps_positions() {
        let (index, schema) = setup();
        let rows = vec![
            schema.header().to_vec(),
            strings(&["", "Nobody"]),
            strings(&["333", "C", "7", "S"]),
        ];

        let ledger = LedgerIndex::build(&rows, &index, &schema, "sent");
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("333").unwrap().position, 3);
    }

    #[test]
    fn test_build_duplicate_key_last_wins() {
        let (index, schema) = setup();
        let rows = vec![
            schema.header().to_vec(),
            strings(&["444", "Old", "7", "A"]),
            strings(&["444", "New", "7", "B"]),
        ];

        let ledger = LedgerIndex::build(&rows, &index, &schema, "sent");
        assert_eq!(ledger.len(), 1);
        let entry = ledger.get("444").unwrap();
        assert_eq!(entry.position, 3);
        assert_eq!(entry.status, "B");
    }

    #[test]
    fn test_header_only_ledger() {
        let (index, schema) = setup();
        let ledger = LedgerIndex::build(&[schema.header().to_vec()], &index, &schema, "sent");
        assert!(ledger.is_empty());
        assert_eq!(ledger.next_position(), 2);
    }

    #[test]
    fn test_entries_sorted_by_position() {
        let (index, schema) = setup();
        let rows = vec![
            schema.header().to_vec(),
            strings(&["b", "B", "7", "S"]),
            strings(&["a", "A", "7", "S"]),
            strings(&["c", "C", "7", "S"]),
        ];
        let ledger = LedgerIndex::build(&rows, &index, &schema, "sent");
        let keys: Vec<&str> = ledger.entries().iter().map(|e| e.tax_id.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_notified_marker_is_case_insensitive() {
        assert_eq!(Notified::from_cell(" Отправлено ", "отправлено"), Notified::Sent);
        assert_eq!(Notified::from_cell("SENT", "sent"), Notified::Sent);
        assert_eq!(Notified::from_cell("", "sent"), Notified::Empty);
        assert_eq!(Notified::from_cell("pending", "sent"), Notified::Empty);
    }
}
