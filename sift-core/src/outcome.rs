//! The final result of a query.

use serde::{Deserialize, Serialize};

use crate::result::DataKind;
use crate::state::HistoryEntry;

/// How the query ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// The planner called the terminal action.
    Finalized,
    /// The iteration or wall-clock budget expired; the answer is a
    /// best-effort synthesis from history.
    BudgetExhausted,
    /// The planner produced unusable output three times in a row.
    PlannerAborted,
    /// The query was cancelled cooperatively.
    Cancelled,
    /// The cycle guard broke a planner loop; best-effort answer.
    CycleBreak,
}

/// Everything the caller gets back: the answer string (always present,
/// even for aborts) plus diagnostics for rendering.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// The final answer, or a short diagnostic for aborted queries.
    pub answer: String,
    /// How the query ended.
    pub status: QueryStatus,
    /// Iterations consumed.
    pub iterations: u32,
    /// Tool names in invocation order.
    pub tool_sequence: Vec<String>,
    /// Full per-iteration history.
    pub history: Vec<HistoryEntry>,
    /// Data-type tag of the terminal result.
    pub terminal_kind: DataKind,
}

impl QueryOutcome {
    /// Whether the query produced a clean, planner-chosen answer.
    pub fn is_finalized(&self) -> bool {
        self.status == QueryStatus::Finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serde() {
        let json = serde_json::to_string(&QueryStatus::BudgetExhausted).unwrap();
        assert_eq!(json, "\"budget_exhausted\"");
    }

    #[test]
    fn finalized_flag() {
        let outcome = QueryOutcome {
            answer: "47".into(),
            status: QueryStatus::Finalized,
            iterations: 4,
            tool_sequence: vec!["grep_logs".into()],
            history: vec![],
            terminal_kind: DataKind::Terminal,
        };
        assert!(outcome.is_finalized());
    }
}
