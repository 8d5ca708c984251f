//! The planner's per-iteration decision.

use serde_json::{Map, Value};

/// Name of the terminal action.
pub const FINALIZE_ACTION: &str = "finalize_answer";

/// What the planner decided to do this iteration.
///
/// The planner emits a single JSON object `{reasoning, action, params}`;
/// the adapter parses it into this sum. Anything unparsable or malformed
/// becomes [`Decision::Invalid`] — never an error — so the orchestrator
/// can count consecutive planner failures without unwinding.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Terminal: present `answer` and stop the loop.
    Finalize {
        /// The final answer string.
        answer: String,
        /// Planner confidence in `[0, 1]`, when given.
        confidence: Option<f64>,
        /// The planner's stated reasoning.
        reasoning: String,
    },
    /// Invoke a named tool with parameters.
    Invoke {
        /// Tool name as emitted by the planner.
        tool: String,
        /// Tool parameters.
        params: Map<String, Value>,
        /// The planner's stated reasoning.
        reasoning: String,
    },
    /// The planner's output could not be understood.
    Invalid {
        /// Why the output was rejected.
        reason: String,
    },
}

impl Decision {
    /// Whether this decision is the invalid sentinel.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Decision::Invalid { .. })
    }

    /// The action name, for history rendering.
    pub fn action(&self) -> &str {
        match self {
            Decision::Finalize { .. } => FINALIZE_ACTION,
            Decision::Invoke { tool, .. } => tool,
            Decision::Invalid { .. } => "__invalid__",
        }
    }
}
