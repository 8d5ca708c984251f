#![deny(missing_docs)]
//! The sift ReAct loop.
//!
//! [`ReactEngine::run`] drives one query from start to answer with bounded
//! work: build context → ask the planner → parse its decision → dispatch
//! the tool → commit the result → repeat, until the planner finalizes, a
//! budget expires, planner output stays unusable, the cycle guard trips,
//! or the query is cancelled. The answer string is always present in the
//! outcome, even for aborts.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use sift_context::{render_params, ContextBuilder, SmartSummarizer};
use sift_core::{
    DataKind, Decision, HistoryEntry, QueryOutcome, QueryState, QueryStatus, ToolData, ToolResult,
};
use sift_llm::{parse_decision, ChatMessage, ChatRequest, LlmClient};
use sift_store::LogStore;
use sift_tool::{ToolInput, ToolRegistry};
use tokio_util::sync::CancellationToken;

/// History summaries keep to one line.
const SUMMARY_CHARS: usize = 160;

/// Tool-name placeholder for planner-failure history entries.
const PLANNER_STEP: &str = "planner";

/// Static configuration for a [`ReactEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum loop iterations before best-effort finalization.
    pub max_iterations: u32,
    /// Row count above which tabular results get a smart summary.
    pub summary_threshold: usize,
    /// Consecutive unusable planner outputs before the query aborts.
    pub max_planner_failures: u32,
    /// How many recent invocations the cycle guard remembers.
    pub cycle_window: usize,
    /// Identical invocations (with unchanged state) tolerated before the
    /// guard forces finalization.
    pub cycle_repeats: usize,
    /// Planner sampling temperature.
    pub temperature: f64,
    /// Planner output token budget.
    pub max_tokens: u32,
    /// Planner model identifier (empty = provider default).
    pub planner_model: String,
    /// Soft wall-clock limit; expiry triggers best-effort finalization.
    pub max_duration: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 12,
            summary_threshold: 50,
            max_planner_failures: 3,
            cycle_window: 6,
            cycle_repeats: 3,
            temperature: 0.1,
            max_tokens: 2048,
            planner_model: String::new(),
            max_duration: None,
        }
    }
}

/// The ReAct orchestrator. Single writer of the per-query state; tools
/// and the summarizer only read and return values.
pub struct ReactEngine {
    planner: Arc<dyn LlmClient>,
    registry: ToolRegistry,
    builder: ContextBuilder,
    summarizer: SmartSummarizer,
    store: Arc<LogStore>,
    config: EngineConfig,
}

impl ReactEngine {
    /// Assemble an engine from its parts.
    pub fn new(
        planner: Arc<dyn LlmClient>,
        registry: ToolRegistry,
        builder: ContextBuilder,
        summarizer: SmartSummarizer,
        store: Arc<LogStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            planner,
            registry,
            builder,
            summarizer,
            store,
            config,
        }
    }

    /// Run one query to completion. The returned outcome always carries
    /// an answer string; aborts carry a short diagnostic instead.
    pub async fn run(&self, query: &str, cancel: CancellationToken) -> QueryOutcome {
        let query_id = uuid::Uuid::new_v4();
        let started = Instant::now();
        tracing::info!(query_id = %query_id, query, "query started");

        let mut state = QueryState::new(self.store.header().columns().to_vec());
        let system = self.builder.system_prompt(&self.registry);
        let mut planner_failures = 0u32;
        let mut recent: VecDeque<(u64, u64)> = VecDeque::new();
        let mut last_values_field: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return finish(state, QueryStatus::Cancelled, "query cancelled".into());
            }
            if let Some(limit) = self.config.max_duration {
                if started.elapsed() >= limit {
                    let answer = best_effort_answer(&state, "the time budget was reached");
                    return finish(state, QueryStatus::BudgetExhausted, answer);
                }
            }

            state.iteration += 1;
            if state.iteration > self.config.max_iterations {
                state.iteration -= 1;
                let answer = best_effort_answer(&state, "the iteration budget was reached");
                return finish(state, QueryStatus::BudgetExhausted, answer);
            }

            let prompt = self.builder.build(query, &state, self.config.max_iterations);
            let request = ChatRequest::new(
                self.config.planner_model.clone(),
                vec![ChatMessage::system(system.clone()), ChatMessage::user(prompt)],
            )
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens);

            let decision = match self.planner.chat(request).await {
                Ok(response) => parse_decision(&response.content),
                Err(err) => Decision::Invalid {
                    reason: format!("planner call failed: {err}"),
                },
            };

            let (tool_name, raw_params) = match decision {
                Decision::Invalid { reason } => {
                    planner_failures += 1;
                    tracing::warn!(query_id = %query_id, planner_failures, %reason, "unusable planner output");
                    state.push_history(HistoryEntry {
                        iteration: state.iteration,
                        tool: PLANNER_STEP.into(),
                        params: String::new(),
                        summary: reason,
                        ok: false,
                        kind: DataKind::Metadata,
                    });
                    if planner_failures >= self.config.max_planner_failures {
                        return finish(
                            state,
                            QueryStatus::PlannerAborted,
                            "Could not parse the planner's decision after repeated attempts"
                                .into(),
                        );
                    }
                    continue;
                }
                Decision::Finalize {
                    answer, confidence, ..
                } => {
                    let params = match confidence {
                        Some(c) => format!("confidence={c}"),
                        None => String::new(),
                    };
                    state.push_history(HistoryEntry {
                        iteration: state.iteration,
                        tool: sift_core::decision::FINALIZE_ACTION.into(),
                        params,
                        summary: truncate(&answer, SUMMARY_CHARS),
                        ok: true,
                        kind: DataKind::Terminal,
                    });
                    tracing::info!(query_id = %query_id, iterations = state.iteration, "query finalized");
                    return finish(state, QueryStatus::Finalized, answer);
                }
                Decision::Invoke { tool, params, .. } => (tool, params),
            };
            planner_failures = 0;

            // Resolve and validate. Failures are recorded without touching
            // state and the loop continues — the message steers the planner.
            let prepared = match self.registry.prepare(&tool_name, &raw_params) {
                Ok(prepared) => prepared,
                Err(err) => {
                    state.push_history(HistoryEntry {
                        iteration: state.iteration,
                        tool: tool_name.clone(),
                        params: render_params(&raw_params),
                        summary: truncate(&err.to_string(), SUMMARY_CHARS),
                        ok: false,
                        kind: DataKind::Metadata,
                    });
                    continue;
                }
            };
            let tool = self
                .registry
                .get(&tool_name)
                .expect("prepare succeeded, tool exists");

            // Cycle guard: the same invocation against unchanged state,
            // repeated past the tolerance, forces finalization.
            let sig = invocation_signature(&tool_name, &prepared);
            let fingerprint = state_fingerprint(&state);
            let repeats = recent
                .iter()
                .filter(|&&(s, f)| s == sig && f == fingerprint)
                .count();
            if repeats >= self.config.cycle_repeats {
                tracing::warn!(query_id = %query_id, tool = %tool_name, "cycle guard tripped");
                state.push_history(HistoryEntry {
                    iteration: state.iteration,
                    tool: tool_name.clone(),
                    params: render_params(&prepared),
                    summary: "cycle guard: identical invocation repeated with no progress".into(),
                    ok: false,
                    kind: DataKind::Metadata,
                });
                let answer = best_effort_answer(&state, "a planning loop was detected");
                return finish(state, QueryStatus::CycleBreak, answer);
            }
            recent.push_back((sig, fingerprint));
            while recent.len() > self.config.cycle_window {
                recent.pop_front();
            }

            // Auto-injection (never overwrites planner-supplied data; the
            // tiny-sample substitution itself happens inside the tools,
            // which see both lists).
            let mut input = ToolInput {
                params: prepared,
                logs: None,
                values: None,
                values_field: None,
                query: query.to_string(),
                cancel: cancel.clone(),
            };
            if tool.requires_logs() {
                input.logs = state.current_logs.clone();
            }
            let declares_values = tool.parameters().iter().any(|p| p.name == "values");
            if declares_values {
                if let Some(values) = state.last_values() {
                    tracing::debug!(
                        query_id = %query_id,
                        tool = %tool_name,
                        count = values.len(),
                        "offering last value list for injection"
                    );
                    input.values = Some(values.to_vec());
                    input.values_field = last_values_field.clone();
                }
            }

            let rendered_params = render_params(&input.params);
            let result: ToolResult = tokio::select! {
                _ = cancel.cancelled() => {
                    state.push_history(HistoryEntry {
                        iteration: state.iteration,
                        tool: tool_name.clone(),
                        params: rendered_params,
                        summary: "cancelled while executing".into(),
                        ok: false,
                        kind: DataKind::Metadata,
                    });
                    return finish(state, QueryStatus::Cancelled, "query cancelled".into());
                }
                result = tool.execute(input) => result,
            };

            state.push_history(HistoryEntry {
                iteration: state.iteration,
                tool: tool_name.clone(),
                params: rendered_params,
                summary: truncate(&result.message, SUMMARY_CHARS),
                ok: result.ok,
                kind: result.kind,
            });

            if result.ok {
                let needs_summary = state.absorb(&result, self.config.summary_threshold);
                if needs_summary {
                    if let Some(ws) = state.current_logs.clone() {
                        let summary = self.summarizer.summarize(&ws, Some(query));
                        state.set_summary(summary.text);
                    }
                }
                if result.meta.field.is_some() && matches!(result.data, ToolData::Values(_)) {
                    last_values_field = result.meta.field.clone();
                }
                if result.kind == DataKind::Terminal {
                    let answer = result.message.clone();
                    tracing::info!(query_id = %query_id, iterations = state.iteration, "terminal tool ended query");
                    return finish(state, QueryStatus::Finalized, answer);
                }
            }
        }
    }
}

/// Stable hash of one invocation: tool name plus canonical parameters.
fn invocation_signature(tool: &str, params: &Map<String, Value>) -> u64 {
    let mut hasher = DefaultHasher::new();
    tool.hash(&mut hasher);
    Value::Object(params.clone()).to_string().hash(&mut hasher);
    hasher.finish()
}

/// Fingerprint of the mutable state the cycle guard watches: working-set
/// identity and the content of the last result.
fn state_fingerprint(state: &QueryState) -> u64 {
    let mut hasher = DefaultHasher::new();
    if let Some(ws) = &state.current_logs {
        (Arc::as_ptr(ws) as usize).hash(&mut hasher);
        ws.len().hash(&mut hasher);
    }
    if let Some(last) = &state.last_result {
        hash_tool_data(last, &mut hasher);
    }
    hasher.finish()
}

fn hash_tool_data(data: &ToolData, hasher: &mut DefaultHasher) {
    match data {
        ToolData::Table(ws) => (Arc::as_ptr(ws) as usize).hash(hasher),
        ToolData::Values(values) => values.hash(hasher),
        ToolData::Counts(counts) => counts.hash(hasher),
        ToolData::Count { unique, total } => {
            unique.hash(hasher);
            total.hash(hasher);
        }
        ToolData::Chain(chain) => {
            chain.targets.hash(hasher);
            chain.depth.hash(hasher);
        }
        ToolData::Text(text) => text.hash(hasher),
        ToolData::Json(value) => value.to_string().hash(hasher),
        ToolData::None => 0u8.hash(hasher),
    }
}

/// The best answer state still holds: the last numeric or aggregated
/// result, else the last successful tool message, else a plain notice.
fn best_effort_answer(state: &QueryState, reason: &str) -> String {
    for entry in state.history.iter().rev() {
        if entry.ok && matches!(entry.kind, DataKind::FinalCount | DataKind::Aggregated) {
            return format!("Partial result ({reason}): {}", entry.summary);
        }
    }
    for entry in state.history.iter().rev() {
        if entry.ok && entry.tool != PLANNER_STEP {
            return format!("Partial result ({reason}): {}", entry.summary);
        }
    }
    format!("No result was produced before {reason}.")
}

fn finish(state: QueryState, status: QueryStatus, answer: String) -> QueryOutcome {
    let terminal_kind = state
        .history
        .last()
        .map(|entry| entry.kind)
        .unwrap_or(DataKind::Metadata);
    QueryOutcome {
        answer,
        status,
        iterations: state.iteration,
        tool_sequence: state
            .history
            .iter()
            .filter(|entry| entry.tool != PLANNER_STEP)
            .map(|entry| entry.tool.clone())
            .collect(),
        history: state.history,
        terminal_kind,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}\u{2026}")
}
