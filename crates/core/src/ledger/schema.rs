//! Ledger column layout: every source column, then the workflow columns.

use tracing::info;

use crate::sheets::{StoreError, TableStore};

use super::codec::{HeaderIndex, SourceRecord};

/// Names of the columns appended after the source columns, in order.
pub const LEDGER_COLUMNS: [&str; 4] = ["added_at", "updated_at", "ticket_url", "notified"];

/// Ledger cells the reconciler and workflow write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerColumn {
    Status,
    AddedAt,
    UpdatedAt,
    TicketUrl,
    Notified,
}

impl LedgerColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerColumn::Status => "status",
            LedgerColumn::AddedAt => "added_at",
            LedgerColumn::UpdatedAt => "updated_at",
            LedgerColumn::TicketUrl => "ticket_url",
            LedgerColumn::Notified => "notified",
        }
    }
}

/// Expected ledger header, derived from the source header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSchema {
    header: Vec<String>,
    source_width: usize,
    status: usize,
}

impl LedgerSchema {
    pub fn new(source_header: &[String], index: &HeaderIndex) -> Self {
        let mut header: Vec<String> = source_header.iter().map(|c| c.trim().to_string()).collect();
        header.extend(LEDGER_COLUMNS.iter().map(|c| c.to_string()));

        Self {
            header,
            source_width: source_header.len(),
            status: index.status,
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn source_width(&self) -> usize {
        self.source_width
    }

    /// Whether an existing header already has the expected layout.
    /// Trailing blank cells are ignored since sheet APIs drop them.
    pub fn matches(&self, header: &[String]) -> bool {
        let trimmed: Vec<&str> = header.iter().map(|c| c.trim()).collect();
        let end = trimmed
            .iter()
            .rposition(|c| !c.is_empty())
            .map_or(0, |i| i + 1);
        trimmed[..end]
            .iter()
            .copied()
            .eq(self.header.iter().map(String::as_str))
    }

    /// 0-based offset of a column within a ledger row.
    pub fn offset(&self, column: LedgerColumn) -> usize {
        match column {
            LedgerColumn::Status => self.status,
            LedgerColumn::AddedAt => self.source_width,
            LedgerColumn::UpdatedAt => self.source_width + 1,
            LedgerColumn::TicketUrl => self.source_width + 2,
            LedgerColumn::Notified => self.source_width + 3,
        }
    }

    /// 1-based sheet column of a ledger cell.
    pub fn column(&self, column: LedgerColumn) -> usize {
        self.offset(column) + 1
    }

    /// Full ledger row for a record seen for the first time.
    pub fn new_row(&self, record: &SourceRecord, added_at: &str) -> Vec<String> {
        let mut row: Vec<String> = record.cells.iter().take(self.source_width).cloned().collect();
        row.resize(self.source_width, String::new());
        row.push(added_at.to_string());
        row.extend(std::iter::repeat_n(String::new(), LEDGER_COLUMNS.len() - 1));
        row
    }

    /// Rewrite the ledger header if it does not match the expected layout.
    ///
    /// `rows` is the ledger as just read; its first row is replaced (or
    /// inserted, for an empty sheet) so positions stay aligned with the
    /// store. Returns whether the header was written.
    pub async fn ensure_header(
        &self,
        store: &dyn TableStore,
        sheet: &str,
        rows: &mut Vec<Vec<String>>,
    ) -> Result<bool, StoreError> {
        if rows.first().is_some_and(|header| self.matches(header)) {
            return Ok(false);
        }

        store.write_header(sheet, &self.header).await?;
        info!(
            sheet = sheet,
            columns = self.header.len(),
            had_header = !rows.is_empty(),
            "Migrated ledger header"
        );

        match rows.first_mut() {
            Some(first) => *first = self.header.clone(),
            None => rows.push(self.header.clone()),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnsConfig;
    use crate::testing::MockTableStore;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn schema() -> LedgerSchema {
        let source = strings(&["tin", "name", "phone", "Статус ЭСФ"]);
        let index = HeaderIndex::resolve(&source, &ColumnsConfig::default()).unwrap();
        LedgerSchema::new(&source, &index)
    }

    #[test]
    fn test_header_layout() {
        let schema = schema();
        assert_eq!(
            schema.header(),
            &strings(&[
                "tin",
                "name",
                "phone",
                "Статус ЭСФ",
                "added_at",
                "updated_at",
                "ticket_url",
                "notified"
            ])[..]
        );
        assert_eq!(schema.column(LedgerColumn::Status), 4);
        assert_eq!(schema.column(LedgerColumn::AddedAt), 5);
        assert_eq!(schema.column(LedgerColumn::UpdatedAt), 6);
        assert_eq!(schema.column(LedgerColumn::TicketUrl), 7);
        assert_eq!(schema.column(LedgerColumn::Notified), 8);
    }

    #[test]
    fn test_matches_ignores_trailing_blanks() {
        let schema = schema();
        let mut header = schema.header().to_vec();
        assert!(schema.matches(&header));
        header.push("  ".to_string());
        assert!(schema.matches(&header));
        header.pop();
        header.pop();
        assert!(!schema.matches(&header));
        assert!(!schema.matches(&[]));
    }

    #[test]
    fn test_new_row_pads_and_truncates() {
        let schema = schema();
        let index = HeaderIndex::resolve(
            &strings(&["tin", "name", "phone", "Статус ЭСФ"]),
            &ColumnsConfig::default(),
        )
        .unwrap();

        let record = SourceRecord::decode(&strings(&["1", "A", "7", "S", "extra"]), &index);
        let row = schema.new_row(&record, "2024-01-01 00:00:00");
        assert_eq!(
            row,
            strings(&["1", "A", "7", "S", "2024-01-01 00:00:00", "", "", ""])
        );
    }

    #[tokio::test]
    async fn test_ensure_header_on_empty_sheet() {
        let store = MockTableStore::new();
        let schema = schema();
        let mut rows = Vec::new();

        let migrated = schema.ensure_header(&store, "ledger", &mut rows).await.unwrap();
        assert!(migrated);
        assert_eq!(rows.len(), 1);
        assert_eq!(store.rows("ledger").await, vec![schema.header().to_vec()]);
    }

    #[tokio::test]
    async fn test_ensure_header_is_idempotent() {
        let store = MockTableStore::new();
        let schema = schema();
        store
            .set_rows("ledger", vec![schema.header().to_vec()])
            .await;
        let mut rows = store.rows("ledger").await;

        let migrated = schema.ensure_header(&store, "ledger", &mut rows).await.unwrap();
        assert!(!migrated);
        assert_eq!(store.header_writes().await, 0);
    }

    #[tokio::test]
    async fn test_ensure_header_rewrites_stale_header() {
        let store = MockTableStore::new();
        let schema = schema();
        store
            .set_rows(
                "ledger",
                vec![
                    strings(&["tin", "name", "phone", "Статус ЭСФ", "UseDesk", "Telegram"]),
                    strings(&["1", "A", "7", "S"]),
                ],
            )
            .await;
        let mut rows = store.rows("ledger").await;

        let migrated = schema.ensure_header(&store, "ledger", &mut rows).await.unwrap();
        assert!(migrated);
        assert_eq!(rows[0], schema.header().to_vec());
        assert_eq!(rows.len(), 2);
        assert_eq!(store.rows("ledger").await[0], schema.header().to_vec());
    }
}
