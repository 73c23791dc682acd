//! Mock table store for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::sheets::{StoreError, TableStore};

/// A recorded cell write for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCellUpdate {
    pub sheet: String,
    /// 1-based row.
    pub row: usize,
    /// 1-based column.
    pub col: usize,
    pub value: String,
}

/// In-memory implementation of the TableStore trait.
///
/// Sheets are plain `Vec<Vec<String>>` with the header at index 0, so row
/// `n` of the store is `rows[n - 1]`. Provides controllable behavior for
/// testing:
/// - Seed and inspect sheet contents
/// - Record cell writes and appends
/// - Fail reads of a sheet, appends of a given key, or writes to a given row
///
/// # Example
///
/// ```rust,ignore
/// use esfwatch_core::testing::MockTableStore;
///
/// let store = MockTableStore::new();
/// store.set_rows("ledger", vec![header]).await;
///
/// reconciler.sync(&records, &mut index, &store, "ledger").await;
///
/// assert_eq!(store.rows("ledger").await.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTableStore {
    sheets: Arc<RwLock<HashMap<String, Vec<Vec<String>>>>>,
    cell_updates: Arc<RwLock<Vec<RecordedCellUpdate>>>,
    appends: Arc<RwLock<usize>>,
    header_writes: Arc<RwLock<usize>>,
    /// Sheets whose reads fail.
    failing_reads: Arc<RwLock<HashSet<String>>>,
    /// Appends whose first cell equals one of these fail.
    failing_append_keys: Arc<RwLock<HashSet<String>>>,
    /// Cell writes to these rows fail.
    failing_rows: Arc<RwLock<HashSet<usize>>>,
    /// When false, appends report no landed position.
    report_positions: Arc<RwLock<bool>>,
}

impl MockTableStore {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self {
            report_positions: Arc::new(RwLock::new(true)),
            ..Default::default()
        }
    }

    /// Replace the contents of a sheet.
    pub async fn set_rows(&self, sheet: &str, rows: Vec<Vec<String>>) {
        self.sheets.write().await.insert(sheet.to_string(), rows);
    }

    /// Current contents of a sheet; empty if it was never written.
    pub async fn rows(&self, sheet: &str) -> Vec<Vec<String>> {
        self.sheets
            .read()
            .await
            .get(sheet)
            .cloned()
            .unwrap_or_default()
    }

    /// Append a row directly, as an external editor would.
    pub async fn push_row(&self, sheet: &str, row: Vec<String>) {
        self.sheets
            .write()
            .await
            .entry(sheet.to_string())
            .or_default()
            .push(row);
    }

    /// All cell writes so far.
    pub async fn cell_updates(&self) -> Vec<RecordedCellUpdate> {
        self.cell_updates.read().await.clone()
    }

    /// Number of rows appended through the trait.
    pub async fn append_count(&self) -> usize {
        *self.appends.read().await
    }

    /// Number of header rewrites.
    pub async fn header_writes(&self) -> usize {
        *self.header_writes.read().await
    }

    /// Total writes of any kind.
    pub async fn write_count(&self) -> usize {
        self.cell_updates.read().await.len() + self.append_count().await + self.header_writes().await
    }

    /// Forget recorded writes, keeping sheet contents.
    pub async fn clear_recorded(&self) {
        self.cell_updates.write().await.clear();
        *self.appends.write().await = 0;
        *self.header_writes.write().await = 0;
    }

    /// Make every read of `sheet` fail.
    pub async fn fail_reads_of(&self, sheet: &str) {
        self.failing_reads.write().await.insert(sheet.to_string());
    }

    /// Make appends of rows whose first cell is `key` fail.
    pub async fn fail_appends_for(&self, key: &str) {
        self.failing_append_keys.write().await.insert(key.to_string());
    }

    /// Make cell writes to `row` fail.
    pub async fn fail_updates_of_row(&self, row: usize) {
        self.failing_rows.write().await.insert(row);
    }

    /// Clear every injected failure.
    pub async fn clear_failures(&self) {
        self.failing_reads.write().await.clear();
        self.failing_append_keys.write().await.clear();
        self.failing_rows.write().await.clear();
    }

    /// Whether appends report the landed row, as Sheets does.
    pub async fn set_report_positions(&self, report: bool) {
        *self.report_positions.write().await = report;
    }

    fn injected(message: &str) -> StoreError {
        StoreError::ApiError {
            status: 500,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl TableStore for MockTableStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn read_all_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, StoreError> {
        if self.failing_reads.read().await.contains(sheet) {
            return Err(Self::injected("injected read failure"));
        }
        Ok(self.rows(sheet).await)
    }

    async fn append_row(&self, sheet: &str, row: &[String]) -> Result<Option<usize>, StoreError> {
        let key = row.first().map(String::as_str).unwrap_or("");
        if self.failing_append_keys.read().await.contains(key) {
            return Err(Self::injected("injected append failure"));
        }

        let position = {
            let mut sheets = self.sheets.write().await;
            let rows = sheets.entry(sheet.to_string()).or_default();
            rows.push(row.to_vec());
            rows.len()
        };
        *self.appends.write().await += 1;

        if *self.report_positions.read().await {
            Ok(Some(position))
        } else {
            Ok(None)
        }
    }

    async fn update_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        value: &str,
    ) -> Result<(), StoreError> {
        if row == 0 || col == 0 {
            return Err(StoreError::ApiError {
                status: 400,
                message: format!("invalid coordinates {}:{}", row, col),
            });
        }
        if self.failing_rows.read().await.contains(&row) {
            return Err(Self::injected("injected cell write failure"));
        }

        {
            let mut sheets = self.sheets.write().await;
            let rows = sheets.entry(sheet.to_string()).or_default();
            if rows.len() < row {
                rows.resize(row, Vec::new());
            }
            let cells = &mut rows[row - 1];
            if cells.len() < col {
                cells.resize(col, String::new());
            }
            cells[col - 1] = value.to_string();
        }

        self.cell_updates.write().await.push(RecordedCellUpdate {
            sheet: sheet.to_string(),
            row,
            col,
            value: value.to_string(),
        });
        Ok(())
    }

    async fn write_header(&self, sheet: &str, header: &[String]) -> Result<(), StoreError> {
        {
            let mut sheets = self.sheets.write().await;
            let rows = sheets.entry(sheet.to_string()).or_default();
            match rows.first_mut() {
                Some(first) => *first = header.to_vec(),
                None => rows.push(header.to_vec()),
            }
        }
        *self.header_writes.write().await += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_append_reports_position() {
        let store = MockTableStore::new();
        store.set_rows("s", vec![strings(&["h"])]).await;

        let landed = store.append_row("s", &strings(&["1"])).await.unwrap();
        assert_eq!(landed, Some(2));

        store.set_report_positions(false).await;
        assert_eq!(store.append_row("s", &strings(&["2"])).await.unwrap(), None);
        assert_eq!(store.append_count().await, 2);
    }

    #[tokio::test]
    async fn test_update_cell_grows_ragged_rows() {
        let store = MockTableStore::new();
        store.set_rows("s", vec![strings(&["a", "b"])]).await;

        store.update_cell("s", 1, 4, "x").await.unwrap();
        store.update_cell("s", 3, 1, "y").await.unwrap();

        let rows = store.rows("s").await;
        assert_eq!(rows[0], strings(&["a", "b", "", "x"]));
        assert!(rows[1].is_empty());
        assert_eq!(rows[2], strings(&["y"]));
        assert_eq!(store.cell_updates().await.len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MockTableStore::new();
        store.fail_reads_of("s").await;
        store.fail_appends_for("k").await;
        store.fail_updates_of_row(2).await;

        assert_err!(store.read_all_rows("s").await);
        assert_err!(store.append_row("t", &strings(&["k"])).await);
        assert_err!(store.update_cell("t", 2, 1, "v").await);
        assert_eq!(store.write_count().await, 0);

        store.clear_failures().await;
        assert_ok!(store.read_all_rows("s").await);
    }
}
