//! Log rows, the column header, and the shared working set.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Ordered column names discovered from the log file header.
///
/// Lookup is exact-match first, then case-insensitive, because planner
/// models routinely write `cmMacAddress` for `CmMacAddress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    columns: Vec<String>,
}

impl Header {
    /// Create a header from ordered column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// The ordered column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the header has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Resolve a column name to its index. Exact match wins over a
    /// case-insensitive match.
    pub fn position(&self, name: &str) -> Option<usize> {
        if let Some(idx) = self.columns.iter().position(|c| c == name) {
            return Some(idx);
        }
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Resolve a possibly mis-cased column name to its canonical spelling.
    pub fn canonical(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.columns[idx].as_str())
    }
}

/// A single log row: the record number in the source file plus its
/// column values, in header order. Rows are read-only once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    /// 1-based record number in the source file (header excluded).
    pub line_number: u64,
    /// Column values in header order.
    pub fields: Vec<String>,
}

/// The current tabular result: a finite ordered sequence of log rows
/// sharing one header.
///
/// At most one working set is active per query. It is published behind an
/// `Arc` and never mutated afterwards; transformations build a new set via
/// [`WorkingSet::with_rows`].
#[derive(Debug, Clone)]
pub struct WorkingSet {
    header: Arc<Header>,
    payload_index: usize,
    rows: Vec<LogRow>,
}

impl WorkingSet {
    /// Create a working set over rows sharing `header`, where
    /// `payload_index` names the column carrying the full event text.
    pub fn new(header: Arc<Header>, payload_index: usize, rows: Vec<LogRow>) -> Self {
        Self {
            header,
            payload_index,
            rows,
        }
    }

    /// The shared header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// A cheap clone of the header handle.
    pub fn header_arc(&self) -> Arc<Header> {
        Arc::clone(&self.header)
    }

    /// Index of the payload column.
    pub fn payload_index(&self) -> usize {
        self.payload_index
    }

    /// The rows, in original order.
    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the set holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The payload text of a row, or `""` when the row is ragged.
    pub fn payload<'a>(&self, row: &'a LogRow) -> &'a str {
        row.fields
            .get(self.payload_index)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// The value of a named column for a row, resolved case-insensitively.
    pub fn column<'a>(&self, row: &'a LogRow, name: &str) -> Option<&'a str> {
        let idx = self.header.position(name)?;
        row.fields.get(idx).map(String::as_str)
    }

    /// Build a new set with the same header and payload column but
    /// different rows (used by pure row transformations).
    pub fn with_rows(&self, rows: Vec<LogRow>) -> Self {
        Self {
            header: Arc::clone(&self.header),
            payload_index: self.payload_index,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Arc<Header> {
        Arc::new(Header::new(vec![
            "Time".into(),
            "Host".into(),
            "Message".into(),
        ]))
    }

    fn row(n: u64, payload: &str) -> LogRow {
        LogRow {
            line_number: n,
            fields: vec![format!("t{n}"), "host-1".into(), payload.into()],
        }
    }

    #[test]
    fn position_prefers_exact_match() {
        let h = Header::new(vec!["id".into(), "ID".into()]);
        assert_eq!(h.position("ID"), Some(1));
        assert_eq!(h.position("Id"), Some(0));
    }

    #[test]
    fn position_falls_back_to_case_insensitive() {
        let h = header();
        assert_eq!(h.position("message"), Some(2));
        assert_eq!(h.position("MESSAGE"), Some(2));
        assert_eq!(h.position("missing"), None);
    }

    #[test]
    fn canonical_restores_spelling() {
        let h = header();
        assert_eq!(h.canonical("host"), Some("Host"));
        assert_eq!(h.canonical("nope"), None);
    }

    #[test]
    fn payload_and_column_access() {
        let ws = WorkingSet::new(header(), 2, vec![row(1, "hello")]);
        let r = &ws.rows()[0];
        assert_eq!(ws.payload(r), "hello");
        assert_eq!(ws.column(r, "host"), Some("host-1"));
        assert_eq!(ws.column(r, "bogus"), None);
    }

    #[test]
    fn payload_of_ragged_row_is_empty() {
        let ws = WorkingSet::new(header(), 2, vec![]);
        let short = LogRow {
            line_number: 9,
            fields: vec!["only".into()],
        };
        assert_eq!(ws.payload(&short), "");
    }

    #[test]
    fn with_rows_preserves_header_and_payload_index() {
        let ws = WorkingSet::new(header(), 2, vec![row(1, "a"), row(2, "b")]);
        let filtered = ws.with_rows(vec![ws.rows()[1].clone()]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.payload_index(), 2);
        assert_eq!(filtered.payload(&filtered.rows()[0]), "b");
    }
}
