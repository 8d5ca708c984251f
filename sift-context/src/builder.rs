//! Per-iteration prompt assembly.
//!
//! The prompt template is fixed: query, iteration counter, the last few
//! history lines, a current-state block, one actionable hint, and the
//! response-format instruction. The template deliberately avoids naming
//! any implementation technology — the planner only ever sees the tool
//! vocabulary.

use std::sync::Arc;

use serde_json::{Map, Value};
use sift_catalog::EntityCatalog;
use sift_core::{QueryState, WorkingSet};
use sift_tool::ToolRegistry;

/// How many history lines the prompt shows.
const HISTORY_WINDOW: usize = 5;

/// Per-parameter rendering cap before redaction.
const PARAM_CHARS: usize = 40;

/// How many raw sample rows the compact state block shows.
const STATE_SAMPLES: usize = 3;

/// Builds the system prompt and the per-iteration user prompt.
pub struct ContextBuilder {
    catalog: Arc<EntityCatalog>,
}

/// The one actionable suggestion appended to the prompt. Selection is a
/// pattern match over query and state features; the first matching rule
/// wins.
#[derive(Debug, PartialEq, Eq)]
enum Hint {
    /// Nothing parsed yet and the query wants counting: name the field.
    ParseField(String),
    /// A field is parsed but not deduplicated: count it.
    CountParsed(String),
    /// The query asks for a per-group breakdown.
    UseAggregators,
}

impl ContextBuilder {
    /// A builder over the shared catalog.
    pub fn new(catalog: Arc<EntityCatalog>) -> Self {
        Self { catalog }
    }

    /// The process-wide system prompt, advertising the tool catalog.
    pub fn system_prompt(&self, registry: &ToolRegistry) -> String {
        format!(
            "You are an analyst answering questions about a large log file. \
             You work in steps: each step you choose exactly one tool, it runs, \
             and you see a short result summary. Choose tools until you can \
             answer, then call finalize_answer with your answer.\n\n\
             Rules:\n\
             - Respond with a single JSON object and nothing after it.\n\
             - Keys: \"reasoning\" (short), \"action\" (a tool name), \
             \"params\" (an object).\n\
             - Raw search results may contain duplicate values; deduplicate \
             or count before reporting unique numbers.\n\
             - If a tool fails, read its message and change course.\n\n\
             Tools:\n{}\n\
             Signatures:\n{}",
            registry.catalog_compact(),
            registry.catalog_detailed(),
        )
    }

    /// The per-iteration user prompt.
    pub fn build(&self, query: &str, state: &QueryState, max_iterations: u32) -> String {
        let mut out = String::new();
        out.push_str(&format!("Query: {query}\n\n"));
        out.push_str(&format!(
            "Iteration: {}/{max_iterations}\n\n",
            state.iteration
        ));

        out.push_str("Previous actions:\n");
        if state.history.is_empty() {
            out.push_str("(none yet)\n");
        } else {
            let start = state.history.len().saturating_sub(HISTORY_WINDOW);
            for entry in &state.history[start..] {
                let status = if entry.ok { "" } else { " [failed]" };
                out.push_str(&format!(
                    "Step {}: {}({}) -> {}{}\n",
                    entry.iteration, entry.tool, entry.params, entry.summary, status
                ));
            }
        }
        out.push('\n');

        out.push_str("Current state:\n");
        out.push_str(&self.state_block(state));
        out.push('\n');

        if let Some(hint) = self.select_hint(query, state) {
            out.push_str(&format!("Hint: {}\n\n", render_hint(&hint)));
        }

        out.push_str(
            "Respond with a single JSON object with keys \"reasoning\", \
             \"action\", and \"params\". You may think inside <think></think> \
             markers first — at most two sentences — but the JSON object must \
             be the last content of your reply.",
        );
        out
    }

    fn state_block(&self, state: &QueryState) -> String {
        if let Some(summary) = &state.current_summary {
            return summary.clone();
        }

        let mut out = String::new();
        match &state.current_logs {
            Some(ws) => {
                out.push_str(&format!("Current logs: {} rows\n", ws.len()));
                for sample in sample_rows(ws, STATE_SAMPLES) {
                    out.push_str(&format!("  - {sample}\n"));
                }
            }
            None => out.push_str("Current logs: none — search the file first\n"),
        }

        if !state.available_fields.is_empty() {
            out.push_str("Available fields:\n");
            for group in self.catalog.group_fields(&state.available_fields) {
                let label = group.kind.unwrap_or("other");
                out.push_str(&format!("  {label}: {}\n", group.fields.join(", ")));
            }
        }

        for (field, record) in &state.field_extractions {
            if record.deduplicated {
                let unique = record
                    .unique_count
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "?".into());
                out.push_str(&format!(
                    "{field}: {unique} unique values (of {} raw)\n",
                    record.raw_count
                ));
            } else {
                out.push_str(&format!(
                    "{field}: {} raw values (may contain duplicates)\n",
                    record.raw_count
                ));
            }
        }

        if let Some(last) = &state.last_result {
            out.push_str(&format!("Last result: {}\n", last.describe()));
        }
        out
    }

    fn select_hint(&self, query: &str, state: &QueryState) -> Option<Hint> {
        let lower = query.to_lowercase();
        let wants_unique = ["unique", "distinct", "count", "how many"]
            .iter()
            .any(|w| lower.contains(w));
        let wants_groups =
            lower.contains(" per ") || lower.contains("for each") || lower.contains("group by");

        if wants_unique && state.field_extractions.is_empty() {
            if let Some((_, field)) = self.catalog.field_for_query(query) {
                return Some(Hint::ParseField(field.to_string()));
            }
        }
        if wants_unique {
            if let Some((field, _)) = state
                .field_extractions
                .iter()
                .find(|(_, record)| !record.deduplicated)
            {
                return Some(Hint::CountParsed(field.clone()));
            }
        }
        if wants_groups {
            return Some(Hint::UseAggregators);
        }
        None
    }
}

fn render_hint(hint: &Hint) -> String {
    match hint {
        Hint::ParseField(field) => format!(
            "the query asks about unique values; extract the {field} field \
             with parse_json_field after loading matching rows"
        ),
        Hint::CountParsed(field) => format!(
            "{field} values are extracted but not deduplicated; call \
             count_values to get the unique count"
        ),
        Hint::UseAggregators => "the query asks for a per-group breakdown; use \
             count_unique_per_group or aggregate_by_field"
            .to_string(),
    }
}

fn sample_rows(ws: &WorkingSet, limit: usize) -> Vec<String> {
    ws.rows()
        .iter()
        .take(limit)
        .map(|r| {
            let payload = ws.payload(r);
            let truncated: String = payload.chars().take(140).collect();
            if payload.chars().count() > 140 {
                format!("{truncated}\u{2026}")
            } else {
                truncated
            }
        })
        .collect()
}

/// Render planner parameters for history lines, redacting anything long:
/// strings are truncated, arrays become `{k items}`, objects become
/// `{...}`.
pub fn render_params(params: &Map<String, Value>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", render_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => {
            if s.chars().count() > PARAM_CHARS {
                let cut: String = s.chars().take(PARAM_CHARS).collect();
                format!("\"{cut}\u{2026}\"")
            } else {
                format!("\"{s}\"")
            }
        }
        Value::Array(items) => format!("{{{} items}}", items.len()),
        Value::Object(_) => "{...}".to_string(),
        other => other.to_string(),
    }
}
