//! The uniform tool result envelope.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::log::WorkingSet;

/// What kind of data a tool produced. The context builder keys its hints
/// off this tag, so every tool must set it deliberately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// A working set of raw log rows (may contain duplicates).
    RawLogs,
    /// A list of extracted values, duplicates possible.
    RawValues,
    /// A deduplicated list of values.
    UniqueValues,
    /// A final unique/total count.
    FinalCount,
    /// Grouped or chained aggregation output.
    Aggregated,
    /// Statistics or other metadata about the data.
    Metadata,
    /// Structured deep-analysis output.
    Analysis,
    /// Rows formatted for display.
    Formatted,
    /// Terminal answer; the loop stops here.
    Terminal,
}

impl DataKind {
    /// Snake-case label for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::RawLogs => "raw_logs",
            DataKind::RawValues => "raw_values",
            DataKind::UniqueValues => "unique_values",
            DataKind::FinalCount => "final_count",
            DataKind::Aggregated => "aggregated",
            DataKind::Metadata => "metadata",
            DataKind::Analysis => "analysis",
            DataKind::Formatted => "formatted",
            DataKind::Terminal => "terminal",
        }
    }
}

/// One hop of a relationship chain: the field and value pivoted on, plus
/// how many distinct neighbor pairs were visible when it was discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHop {
    /// Field name of the pivot.
    pub field: String,
    /// Value pivoted on.
    pub value: String,
    /// Distinct `(field, value)` pairs co-occurring at discovery time.
    pub neighbor_count: usize,
}

/// Outcome of a relationship walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOutcome {
    /// Pivot hops from the start value, in traversal order.
    pub path: Vec<ChainHop>,
    /// Target-field values found at the end of the chain.
    pub targets: Vec<String>,
    /// Grep levels traversed to reach the targets (1 = the target field
    /// co-occurs with the start value).
    pub depth: usize,
    /// Whether the target field was reached.
    pub found: bool,
}

/// The data half of a tool result, one variant per shape a tool can
/// produce. Tabular data is shared, never copied.
#[derive(Debug, Clone)]
pub enum ToolData {
    /// A working set of log rows.
    Table(Arc<WorkingSet>),
    /// A list of string values.
    Values(Vec<String>),
    /// An ordered mapping of group → count.
    Counts(Vec<(String, u64)>),
    /// A final count result.
    Count {
        /// Distinct values.
        unique: u64,
        /// Total input values.
        total: u64,
    },
    /// A relationship chain.
    Chain(ChainOutcome),
    /// Free text.
    Text(String),
    /// Structured JSON (analysis output).
    Json(serde_json::Value),
    /// No data.
    None,
}

impl ToolData {
    /// The value list, when this is a `Values` variant.
    pub fn values(&self) -> Option<&[String]> {
        match self {
            ToolData::Values(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this is tabular data.
    pub fn is_table(&self) -> bool {
        matches!(self, ToolData::Table(_))
    }

    /// Short tag + size description for state snapshots, e.g.
    /// `list of 39 values` or `counts for 3 groups`.
    pub fn describe(&self) -> String {
        match self {
            ToolData::Table(ws) => format!("{} log rows", ws.len()),
            ToolData::Values(v) => format!("list of {} values", v.len()),
            ToolData::Counts(c) => format!("counts for {} groups", c.len()),
            ToolData::Count { unique, total } => {
                format!("count: {unique} unique of {total} total")
            }
            ToolData::Chain(c) => {
                if c.found {
                    format!("chain of {} hops, {} target values", c.path.len(), c.targets.len())
                } else {
                    format!("chain search, no target after {} hops", c.path.len())
                }
            }
            ToolData::Text(t) => format!("text ({} chars)", t.len()),
            ToolData::Json(_) => "structured analysis".to_string(),
            ToolData::None => "none".to_string(),
        }
    }
}

/// Metadata accompanying a tool result.
#[derive(Debug, Clone, Default)]
pub struct ResultMeta {
    /// Which field a value extraction was performed on, if any. Drives
    /// the per-field extraction records in query state.
    pub field: Option<String>,
    /// How many source lines a streaming scan visited, if any.
    pub lines_scanned: Option<u64>,
}

/// The uniform envelope returned by every tool.
///
/// Expected failures (field not found, zero results where some were
/// required, invalid user regex) come back as `ok = false` with a
/// human-readable message and next-step hints — they are data, not errors,
/// and never crash the loop.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Whether the tool accomplished what was asked.
    pub ok: bool,
    /// Human-readable outcome, fed back to the planner.
    pub message: String,
    /// The produced data.
    pub data: ToolData,
    /// The data-type tag.
    pub kind: DataKind,
    /// Accompanying metadata.
    pub meta: ResultMeta,
}

impl ToolResult {
    /// A successful result.
    pub fn ok(message: impl Into<String>, data: ToolData, kind: DataKind) -> Self {
        Self {
            ok: true,
            message: message.into(),
            data,
            kind,
            meta: ResultMeta::default(),
        }
    }

    /// A failed result. Carries no data; the kind is `Metadata`.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            data: ToolData::None,
            kind: DataKind::Metadata,
            meta: ResultMeta::default(),
        }
    }

    /// Attach the field name an extraction was performed on.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.meta.field = Some(field.into());
        self
    }

    /// Attach the number of lines a streaming scan visited.
    #[must_use]
    pub fn with_lines_scanned(mut self, lines: u64) -> Self {
        self.meta.lines_scanned = Some(lines);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_kind_serde_tag() {
        let json = serde_json::to_string(&DataKind::RawLogs).unwrap();
        assert_eq!(json, "\"raw_logs\"");
        let back: DataKind = serde_json::from_str("\"final_count\"").unwrap();
        assert_eq!(back, DataKind::FinalCount);
    }

    #[test]
    fn as_str_matches_serde() {
        for kind in [
            DataKind::RawLogs,
            DataKind::RawValues,
            DataKind::UniqueValues,
            DataKind::FinalCount,
            DataKind::Aggregated,
            DataKind::Metadata,
            DataKind::Analysis,
            DataKind::Formatted,
            DataKind::Terminal,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn fail_has_no_data() {
        let r = ToolResult::fail("field 'Foo' not found");
        assert!(!r.ok);
        assert!(matches!(r.data, ToolData::None));
        assert_eq!(r.kind, DataKind::Metadata);
    }

    #[test]
    fn builders_attach_meta() {
        let r = ToolResult::ok("39 values", ToolData::Values(vec!["a".into()]), DataKind::RawValues)
            .with_field("CmMacAddress")
            .with_lines_scanned(1000);
        assert_eq!(r.meta.field.as_deref(), Some("CmMacAddress"));
        assert_eq!(r.meta.lines_scanned, Some(1000));
    }

    #[test]
    fn describe_variants() {
        assert_eq!(
            ToolData::Values(vec!["a".into(), "b".into()]).describe(),
            "list of 2 values"
        );
        assert_eq!(
            ToolData::Count { unique: 47, total: 100 }.describe(),
            "count: 47 unique of 100 total"
        );
    }
}
