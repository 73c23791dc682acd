//! Mapping between untyped sheet rows and typed source records.

use std::collections::HashMap;

use thiserror::Error;

use crate::config::ColumnsConfig;

/// Errors resolving the header row.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("required column '{0}' is missing from the header")]
    MissingColumn(String),

    #[error("sheet '{0}' has no header row")]
    EmptySheet(String),
}

/// Positions (0-based) of the required columns, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderIndex {
    pub tax_id: usize,
    pub name: usize,
    pub phone: usize,
    pub status: usize,
    width: usize,
}

impl HeaderIndex {
    /// Resolve the required columns from a header row.
    ///
    /// Header cells are compared after trimming. When a name repeats, the
    /// first occurrence wins.
    pub fn resolve(header: &[String], columns: &ColumnsConfig) -> Result<Self, CodecError> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (idx, cell) in header.iter().enumerate() {
            positions.entry(cell.trim()).or_insert(idx);
        }

        let lookup = |name: &str| {
            positions
                .get(name.trim())
                .copied()
                .ok_or_else(|| CodecError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            tax_id: lookup(&columns.tax_id)?,
            name: lookup(&columns.name)?,
            phone: lookup(&columns.phone)?,
            status: lookup(&columns.status)?,
            width: header.len(),
        })
    }

    /// Number of columns in the header this index was resolved from.
    pub fn width(&self) -> usize {
        self.width
    }

    fn required_len(&self) -> usize {
        [self.tax_id, self.name, self.phone, self.status]
            .into_iter()
            .max()
            .map_or(0, |max| max + 1)
    }
}

/// One row of the upstream dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub tax_id: String,
    pub name: String,
    /// Digits only: `+` and whitespace removed.
    pub phone: String,
    pub status: String,
    /// The raw row, kept verbatim for the ledger copy.
    pub cells: Vec<String>,
    truncated: bool,
}

impl SourceRecord {
    /// Decode a row. Never fails: a row too short to reach a required
    /// column gets an empty value there and is marked ineligible.
    pub fn decode(row: &[String], index: &HeaderIndex) -> Self {
        Self {
            tax_id: cell(row, index.tax_id).to_string(),
            name: cell(row, index.name).to_string(),
            phone: normalize_phone(cell(row, index.phone)),
            status: cell(row, index.status).to_string(),
            cells: row.to_vec(),
            truncated: row.len() < index.required_len(),
        }
    }

    /// Whether the reconciler should look at this record at all.
    pub fn is_eligible(&self) -> bool {
        !self.truncated && !self.tax_id.is_empty()
    }
}

/// Trimmed cell value, empty when the row is too short.
pub(crate) fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|c| c.trim()).unwrap_or("")
}

/// Strip `+` and every whitespace character from a phone number.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '+' && !c.is_whitespace())
        .collect()
}

/// Helpdesk "position" derived from a full name: drop the first token and
/// keep up to the next two. Names with fewer than three tokens are kept whole.
pub fn extract_position(name: &str) -> String {
    let parts: Vec<&str> = name.split_whitespace().collect();
    if parts.len() >= 3 {
        parts[1..3].join(" ")
    } else {
        name.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        header(cells)
    }

    fn index() -> HeaderIndex {
        HeaderIndex::resolve(
            &header(&["id", "tin", "name", "phone", "Статус ЭСФ", "city"]),
            &ColumnsConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_header_positions() {
        let index = index();
        assert_eq!(index.tax_id, 1);
        assert_eq!(index.name, 2);
        assert_eq!(index.phone, 3);
        assert_eq!(index.status, 4);
        assert_eq!(index.width(), 6);
    }

    #[test]
    fn test_resolve_header_trims_cells() {
        let index = HeaderIndex::resolve(
            &header(&[" tin ", "name", "phone ", "Статус ЭСФ"]),
            &ColumnsConfig::default(),
        )
        .unwrap();
        assert_eq!(index.tax_id, 0);
        assert_eq!(index.phone, 2);
    }

    #[test]
    fn test_resolve_header_missing_column() {
        let err = HeaderIndex::resolve(
            &header(&["tin", "name", "phone"]),
            &ColumnsConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, CodecError::MissingColumn("Статус ЭСФ".to_string()));
    }

    #[test]
    fn test_decode_full_row() {
        let record = SourceRecord::decode(
            &row(&[
                "1",
                " 123456789012 ",
                "Aigerim Bolatovna",
                "+7 701 111 22 33",
                "NO_REQUIRED_PERMISSIONS",
                "Almaty",
            ]),
            &index(),
        );
        assert_eq!(record.tax_id, "123456789012");
        assert_eq!(record.name, "Aigerim Bolatovna");
        assert_eq!(record.phone, "77011112233");
        assert_eq!(record.status, "NO_REQUIRED_PERMISSIONS");
        assert_eq!(record.cells.len(), 6);
        assert_eq!(record.cells[1], " 123456789012 ");
        assert!(record.is_eligible());
    }

    #[test]
    fn test_decode_short_row_is_ineligible() {
        let record = SourceRecord::decode(&row(&["1", "123456789012", "Name"]), &index());
        assert_eq!(record.tax_id, "123456789012");
        assert_eq!(record.phone, "");
        assert_eq!(record.status, "");
        assert!(!record.is_eligible());
    }

    #[test]
    fn test_decode_empty_row() {
        let record = SourceRecord::decode(&[], &index());
        assert_eq!(record.tax_id, "");
        assert!(!record.is_eligible());
    }

    #[test]
    fn test_decode_empty_tax_id_is_ineligible() {
        let record = SourceRecord::decode(
            &row(&["1", "  ", "Name", "7701", "NO_REQUIRED_PERMISSIONS"]),
            &index(),
        );
        assert!(!record.is_eligible());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+7 701 111 22 33"), "77011112233");
        assert_eq!(normalize_phone("7+701\t111"), "7701111");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn test_extract_position() {
        assert_eq!(extract_position("Иванов Иван Иванович"), "Иван Иванович");
        assert_eq!(extract_position("ИП Иванов Иван Иванович"), "Иванов Иван");
        assert_eq!(extract_position("Aigerim Bolatovna"), "Aigerim Bolatovna");
        assert_eq!(extract_position("  Solo  "), "Solo");
    }
}
