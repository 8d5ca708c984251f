//! Per-query memory.
//!
//! One [`QueryState`] exists per query, owned and mutated only by the
//! orchestrator. Tools receive read-only borrows of its contents and
//! communicate back exclusively through their returned [`ToolResult`];
//! the orchestrator commits via [`QueryState::absorb`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::log::WorkingSet;
use crate::result::{DataKind, ToolData, ToolResult};

/// How far extraction of a single field has progressed. The context
/// builder uses this to steer the planner toward the correct next step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldExtraction {
    /// Number of raw values extracted (duplicates possible).
    pub raw_count: usize,
    /// Whether a deduplication pass has run.
    pub deduplicated: bool,
    /// Distinct value count, once known.
    pub unique_count: Option<usize>,
}

/// One line of tool history. Append-only within a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// 1-based iteration this entry belongs to.
    pub iteration: u32,
    /// Tool (or `planner`) the entry records.
    pub tool: String,
    /// Redacted parameter rendering.
    pub params: String,
    /// Short outcome summary.
    pub summary: String,
    /// Whether the invocation succeeded.
    pub ok: bool,
    /// Data-type tag of the result.
    pub kind: DataKind,
}

/// Per-query memory: working set, last non-tabular result, extraction
/// records, history, and the iteration counter.
#[derive(Debug, Default)]
pub struct QueryState {
    /// The active working set, if any. At most one exists at a time.
    pub current_logs: Option<Arc<WorkingSet>>,
    /// The most recent non-tabular tool output.
    pub last_result: Option<ToolData>,
    /// Per-field extraction progress, keyed by canonical field name.
    pub field_extractions: BTreeMap<String, FieldExtraction>,
    /// Append-only tool history.
    pub history: Vec<HistoryEntry>,
    /// Current iteration, starting at 0 before the first step.
    pub iteration: u32,
    /// Smart summary of the working set, when it exceeded the threshold.
    pub current_summary: Option<String>,
    /// Column names available in the log file.
    pub available_fields: Vec<String>,
    /// Up to two raw payloads captured when logs first arrived.
    pub log_samples: Vec<String>,
}

impl QueryState {
    /// Fresh state for a query over a file with the given columns.
    pub fn new(available_fields: Vec<String>) -> Self {
        Self {
            available_fields,
            ..Default::default()
        }
    }

    /// Commit a tool result into state, following the update rules:
    ///
    /// - tabular output replaces the working set (and clears any stale
    ///   summary); returns `true` when the row count exceeds
    ///   `summary_threshold`, signalling that a smart summary is needed;
    /// - non-tabular output lands in `last_result` and updates the
    ///   extraction record for the originating field;
    /// - failed and terminal results change nothing.
    pub fn absorb(&mut self, result: &ToolResult, summary_threshold: usize) -> bool {
        if !result.ok || result.kind == DataKind::Terminal {
            return false;
        }
        match &result.data {
            ToolData::Table(ws) => {
                if self.log_samples.is_empty() {
                    self.log_samples = ws
                        .rows()
                        .iter()
                        .take(2)
                        .map(|r| ws.payload(r).to_string())
                        .collect();
                }
                self.current_logs = Some(Arc::clone(ws));
                self.current_summary = None;
                ws.len() > summary_threshold
            }
            ToolData::None => false,
            other => {
                self.last_result = Some(other.clone());
                if let Some(field) = &result.meta.field {
                    self.record_extraction(field, other, result.kind);
                }
                false
            }
        }
    }

    fn record_extraction(&mut self, field: &str, data: &ToolData, kind: DataKind) {
        let entry = self.field_extractions.entry(field.to_string()).or_default();
        match (kind, data) {
            (DataKind::RawValues, ToolData::Values(v)) => {
                entry.raw_count = v.len();
                entry.deduplicated = false;
                entry.unique_count = None;
            }
            (DataKind::UniqueValues, ToolData::Values(v)) => {
                if entry.raw_count == 0 {
                    entry.raw_count = v.len();
                }
                entry.deduplicated = true;
                entry.unique_count = Some(v.len());
            }
            (DataKind::FinalCount, ToolData::Count { unique, total }) => {
                if entry.raw_count == 0 {
                    entry.raw_count = *total as usize;
                }
                entry.deduplicated = true;
                entry.unique_count = Some(*unique as usize);
            }
            _ => {}
        }
    }

    /// Store the smart summary for the current working set.
    pub fn set_summary(&mut self, text: String) {
        self.current_summary = Some(text);
    }

    /// Append a history entry.
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    /// The last result's value list, when it is one.
    pub fn last_values(&self) -> Option<&[String]> {
        self.last_result.as_ref().and_then(|d| d.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{Header, LogRow};
    use crate::result::ResultMeta;

    fn working_set(rows: usize) -> Arc<WorkingSet> {
        let header = Arc::new(Header::new(vec!["Message".into()]));
        let rows = (0..rows)
            .map(|i| LogRow {
                line_number: i as u64 + 1,
                fields: vec![format!("payload {i}")],
            })
            .collect();
        Arc::new(WorkingSet::new(header, 0, rows))
    }

    fn table_result(rows: usize) -> ToolResult {
        ToolResult::ok(
            format!("{rows} rows"),
            ToolData::Table(working_set(rows)),
            DataKind::RawLogs,
        )
    }

    #[test]
    fn small_table_needs_no_summary() {
        let mut state = QueryState::new(vec!["Message".into()]);
        let needs = state.absorb(&table_result(10), 50);
        assert!(!needs);
        assert_eq!(state.current_logs.as_ref().unwrap().len(), 10);
        assert_eq!(state.log_samples.len(), 2);
    }

    #[test]
    fn large_table_requests_summary_and_clears_stale_one() {
        let mut state = QueryState::new(vec![]);
        state.current_summary = Some("old".into());
        let needs = state.absorb(&table_result(80), 50);
        assert!(needs);
        assert!(state.current_summary.is_none());
    }

    #[test]
    fn new_table_replaces_working_set() {
        let mut state = QueryState::new(vec![]);
        state.absorb(&table_result(5), 50);
        let first = Arc::clone(state.current_logs.as_ref().unwrap());
        state.absorb(&table_result(7), 50);
        let second = state.current_logs.as_ref().unwrap();
        assert!(!Arc::ptr_eq(&first, second));
        assert_eq!(second.len(), 7);
        // Samples are captured once, from the first working set.
        assert_eq!(state.log_samples[0], "payload 0");
    }

    #[test]
    fn non_tabular_leaves_working_set_untouched() {
        let mut state = QueryState::new(vec![]);
        state.absorb(&table_result(5), 50);
        let result = ToolResult::ok(
            "39 values",
            ToolData::Values(vec!["a".into(); 39]),
            DataKind::RawValues,
        )
        .with_field("CmMacAddress");
        state.absorb(&result, 50);
        assert_eq!(state.current_logs.as_ref().unwrap().len(), 5);
        assert_eq!(state.last_values().unwrap().len(), 39);
        let rec = &state.field_extractions["CmMacAddress"];
        assert_eq!(rec.raw_count, 39);
        assert!(!rec.deduplicated);
    }

    #[test]
    fn unique_pass_marks_deduplicated() {
        let mut state = QueryState::new(vec![]);
        let raw = ToolResult::ok(
            "39 values",
            ToolData::Values(vec!["a".into(); 39]),
            DataKind::RawValues,
        )
        .with_field("CmMacAddress");
        state.absorb(&raw, 50);
        let unique = ToolResult::ok(
            "12 unique",
            ToolData::Values(vec!["a".into(); 12]),
            DataKind::UniqueValues,
        )
        .with_field("CmMacAddress");
        state.absorb(&unique, 50);
        let rec = &state.field_extractions["CmMacAddress"];
        assert_eq!(rec.raw_count, 39);
        assert!(rec.deduplicated);
        assert_eq!(rec.unique_count, Some(12));
    }

    #[test]
    fn final_count_fills_extraction_record() {
        let mut state = QueryState::new(vec![]);
        let count = ToolResult::ok(
            "47 unique of 100",
            ToolData::Count {
                unique: 47,
                total: 100,
            },
            DataKind::FinalCount,
        )
        .with_field("CmMacAddress");
        state.absorb(&count, 50);
        let rec = &state.field_extractions["CmMacAddress"];
        assert_eq!(rec.unique_count, Some(47));
        assert!(rec.deduplicated);
    }

    #[test]
    fn failed_result_changes_nothing() {
        let mut state = QueryState::new(vec![]);
        state.absorb(&table_result(5), 50);
        let mut failed = ToolResult::fail("field not found");
        failed.meta = ResultMeta {
            field: Some("Bogus".into()),
            lines_scanned: None,
        };
        state.absorb(&failed, 50);
        assert!(state.last_result.is_none());
        assert!(state.field_extractions.is_empty());
        assert_eq!(state.current_logs.as_ref().unwrap().len(), 5);
    }

    #[test]
    fn terminal_result_changes_nothing() {
        let mut state = QueryState::new(vec![]);
        let terminal = ToolResult::ok(
            "done",
            ToolData::Text("answer".into()),
            DataKind::Terminal,
        );
        state.absorb(&terminal, 50);
        assert!(state.last_result.is_none());
    }
}
