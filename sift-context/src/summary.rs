//! Entity-aware compression of a working set.
//!
//! Summarization is a pure function of the working set, the query, and
//! the configuration: same inputs, same output. Typical compression on a
//! large set is two orders of magnitude; the text block stays under 2 KB.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use sift_catalog::EntityCatalog;
use sift_core::{ParsedEvent, Severity, WorkingSet};

/// Hard ceiling on the rendered summary text.
const MAX_TEXT_BYTES: usize = 2048;

/// Per-line truncation for sample rows.
const SAMPLE_LINE_CHARS: usize = 160;

/// How many values to show per entity kind, and how many top
/// functions/messages to keep.
const TOP_K: usize = 5;

/// Tuning for the summarizer.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// How many sample rows to include.
    pub sample_budget: usize,
    /// Weight of importance versus diversity when picking samples
    /// (`score = α·importance + (1−α)·diversity`).
    pub importance_weight: f64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            sample_budget: 10,
            importance_weight: 0.6,
        }
    }
}

/// Aggregate statistics over a working set.
#[derive(Debug, Clone, Default)]
pub struct SummaryStats {
    /// Total rows.
    pub rows: usize,
    /// Count per severity, in ascending severity order; absent severities
    /// carry zero.
    pub severity_counts: Vec<(Severity, usize)>,
    /// Most frequent function names.
    pub top_functions: Vec<(String, usize)>,
    /// Most frequent messages (truncated).
    pub top_messages: Vec<(String, usize)>,
    /// Earliest and latest parsed timestamps.
    pub time_range: Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)>,
}

/// The summarizer's output contract.
#[derive(Debug, Clone)]
pub struct Summary {
    /// The rendered text block (≤ 2 KB).
    pub text: String,
    /// Distinct values per entity kind, in first-seen order.
    pub entities: Vec<(String, Vec<String>)>,
    /// Aggregate statistics.
    pub stats: SummaryStats,
    /// Formatted sample rows.
    pub samples: Vec<String>,
}

/// Entity-aware working-set compressor.
pub struct SmartSummarizer {
    catalog: Arc<EntityCatalog>,
    config: SummarizerConfig,
}

/// Field names probed for a "function" signal, in order.
const FUNCTION_FIELDS: &[&str] = &["function", "func", "module", "component"];

impl SmartSummarizer {
    /// A summarizer with default tuning.
    pub fn new(catalog: Arc<EntityCatalog>) -> Self {
        Self {
            catalog,
            config: SummarizerConfig::default(),
        }
    }

    /// A summarizer with explicit tuning.
    pub fn with_config(catalog: Arc<EntityCatalog>, config: SummarizerConfig) -> Self {
        Self { catalog, config }
    }

    /// Compress `ws` into a [`Summary`]. `query` enables query-aware
    /// sample weighting. Side-effect free and deterministic.
    pub fn summarize(&self, ws: &WorkingSet, query: Option<&str>) -> Summary {
        let events: Vec<ParsedEvent> = ws
            .rows()
            .iter()
            .map(|r| ParsedEvent::from_payload(ws.payload(r)))
            .collect();

        let extraction = self.extract_entities(ws, &events);
        let stats = build_stats(&events);
        let samples = self.pick_samples(ws, &events, &extraction, query);
        let text = self.render(&stats, &extraction, &samples);
        tracing::debug!(rows = ws.len(), bytes = text.len(), "working set summarized");

        Summary {
            text,
            entities: extraction
                .per_kind
                .iter()
                .map(|(kind, values)| (kind.clone(), values.clone()))
                .collect(),
            stats,
            samples,
        }
    }

    fn extract_entities(&self, ws: &WorkingSet, events: &[ParsedEvent]) -> EntityExtraction {
        let mut per_kind: Vec<(String, Vec<String>)> = Vec::new();
        let mut value_counts: HashMap<String, usize> = HashMap::new();
        let mut row_values: Vec<Vec<String>> = vec![Vec::new(); events.len()];
        let mut row_kind_counts: Vec<usize> = vec![0; events.len()];

        for kind in self.catalog.kinds() {
            let mut seen: Vec<String> = Vec::new();
            for (row_idx, event) in events.iter().enumerate() {
                let mut row_has_kind = false;
                for field in &kind.fields {
                    if let Some((_, value)) = event.field_ci(field) {
                        if !value.is_empty() {
                            note_value(
                                value,
                                &mut seen,
                                &mut value_counts,
                                &mut row_values[row_idx],
                            );
                            row_has_kind = true;
                        }
                    }
                }
                let payload = ws.payload(&ws.rows()[row_idx]);
                for pattern in &kind.patterns {
                    for m in pattern.find_iter(payload) {
                        note_value(
                            m.as_str(),
                            &mut seen,
                            &mut value_counts,
                            &mut row_values[row_idx],
                        );
                        row_has_kind = true;
                    }
                }
                if row_has_kind {
                    row_kind_counts[row_idx] += 1;
                }
            }
            if !seen.is_empty() {
                per_kind.push((kind.name.clone(), seen));
            }
        }

        EntityExtraction {
            per_kind,
            value_counts,
            row_values,
            row_kind_counts,
        }
    }

    fn pick_samples(
        &self,
        ws: &WorkingSet,
        events: &[ParsedEvent],
        extraction: &EntityExtraction,
        query: Option<&str>,
    ) -> Vec<String> {
        let rows = ws.rows();
        if rows.is_empty() {
            return Vec::new();
        }
        let budget = self.config.sample_budget.min(rows.len());
        let alpha = self.config.importance_weight.clamp(0.0, 1.0);

        let query_kinds: HashSet<&str> = query
            .map(|q| {
                self.catalog
                    .kinds_in_query(q)
                    .into_iter()
                    .map(|k| k.name.as_str())
                    .collect()
            })
            .unwrap_or_default();
        let query_fields: HashSet<String> = query_kinds
            .iter()
            .filter_map(|&name| self.catalog.kind(name))
            .flat_map(|k| k.fields.iter().map(|f| f.to_lowercase()))
            .collect();

        let importance: Vec<f64> = events
            .iter()
            .enumerate()
            .map(|(idx, event)| {
                let severity_score = match event.severity {
                    Some(Severity::Error) => 1.0,
                    Some(Severity::Warn) => 0.75,
                    Some(Severity::Info) => 0.5,
                    Some(Severity::Debug) => 0.25,
                    None => 0.4,
                };
                let rarity = extraction.row_values[idx]
                    .iter()
                    .map(|v| {
                        let count = *extraction.value_counts.get(v).unwrap_or(&1) as f64;
                        1.0 - (count / events.len() as f64)
                    })
                    .fold(0.0f64, f64::max);
                let relational = if extraction.row_kind_counts[idx] >= 2 {
                    1.0
                } else {
                    0.0
                };
                let query_bonus = if !query_fields.is_empty()
                    && event
                        .fields
                        .keys()
                        .any(|k| query_fields.contains(&k.to_lowercase()))
                {
                    0.15
                } else {
                    0.0
                };
                (0.45 * severity_score + 0.35 * rarity + 0.2 * relational + query_bonus).min(1.0)
            })
            .collect();

        // Greedy selection: coverage across severities, time terciles, and
        // entity values drives the diversity term.
        let tercile = |idx: usize| idx * 3 / rows.len().max(1);
        let mut seen_severities: HashSet<Option<Severity>> = HashSet::new();
        let mut seen_terciles: HashSet<usize> = HashSet::new();
        let mut seen_values: HashSet<String> = HashSet::new();
        let mut selected: Vec<usize> = Vec::new();
        let mut remaining: Vec<usize> = (0..rows.len()).collect();

        while selected.len() < budget && !remaining.is_empty() {
            let mut best: Option<(f64, usize, usize)> = None; // (score, row idx, pos)
            for (pos, &idx) in remaining.iter().enumerate() {
                let new_severity = !seen_severities.contains(&events[idx].severity);
                let new_tercile = !seen_terciles.contains(&tercile(idx));
                let new_value = extraction.row_values[idx]
                    .iter()
                    .any(|v| !seen_values.contains(v));
                let diversity = (new_severity as u8 + new_tercile as u8 + new_value as u8) as f64
                    / 3.0;
                let score = alpha * importance[idx] + (1.0 - alpha) * diversity;
                let better = match best {
                    None => true,
                    Some((best_score, best_idx, _)) => {
                        score > best_score + f64::EPSILON
                            || ((score - best_score).abs() <= f64::EPSILON && idx < best_idx)
                    }
                };
                if better {
                    best = Some((score, idx, pos));
                }
            }
            let (_, idx, pos) = best.expect("remaining is non-empty");
            remaining.swap_remove(pos);
            selected.push(idx);
            seen_severities.insert(events[idx].severity);
            seen_terciles.insert(tercile(idx));
            for v in &extraction.row_values[idx] {
                seen_values.insert(v.clone());
            }
        }

        selected.sort_unstable();
        selected
            .into_iter()
            .map(|idx| {
                let row = &rows[idx];
                format!(
                    "line {}: {}",
                    row.line_number,
                    truncate(ws.payload(row), SAMPLE_LINE_CHARS)
                )
            })
            .collect()
    }

    fn render(
        &self,
        stats: &SummaryStats,
        extraction: &EntityExtraction,
        samples: &[String],
    ) -> String {
        let mut out = String::new();
        out.push_str(&format!("Rows: {}\n", stats.rows));

        let severities: Vec<String> = stats
            .severity_counts
            .iter()
            .rev()
            .filter(|(_, n)| *n > 0)
            .map(|(s, n)| format!("{s}={n}"))
            .collect();
        if !severities.is_empty() {
            out.push_str(&format!("Severities: {}\n", severities.join(" ")));
        }
        if let Some((from, to)) = &stats.time_range {
            out.push_str(&format!(
                "Time range: {} .. {}\n",
                from.to_rfc3339(),
                to.to_rfc3339()
            ));
        }
        if !extraction.per_kind.is_empty() {
            out.push_str("Entities:\n");
            for (kind, values) in &extraction.per_kind {
                let shown: Vec<&str> = values.iter().take(TOP_K).map(String::as_str).collect();
                let more = values.len().saturating_sub(TOP_K);
                let suffix = if more > 0 {
                    format!(" (+{more} more)")
                } else {
                    String::new()
                };
                out.push_str(&format!(
                    "  {kind} ({}): {}{suffix}\n",
                    values.len(),
                    shown.join(", ")
                ));
            }
        }
        if !stats.top_functions.is_empty() {
            let rendered: Vec<String> = stats
                .top_functions
                .iter()
                .map(|(f, n)| format!("{f}={n}"))
                .collect();
            out.push_str(&format!("Top functions: {}\n", rendered.join(" ")));
        }
        if !stats.top_messages.is_empty() {
            let rendered: Vec<String> = stats
                .top_messages
                .iter()
                .map(|(m, n)| format!("\"{m}\"={n}"))
                .collect();
            out.push_str(&format!("Top messages: {}\n", rendered.join(" ")));
        }
        if !samples.is_empty() {
            out.push_str("Samples:\n");
            for (i, sample) in samples.iter().enumerate() {
                out.push_str(&format!("  {}. {sample}\n", i + 1));
            }
        }

        if out.len() > MAX_TEXT_BYTES {
            let mut cut = MAX_TEXT_BYTES;
            while cut > 0 && !out.is_char_boundary(cut) {
                cut -= 1;
            }
            out.truncate(cut);
            out.push('\u{2026}');
        }
        out
    }
}

struct EntityExtraction {
    per_kind: Vec<(String, Vec<String>)>,
    value_counts: HashMap<String, usize>,
    row_values: Vec<Vec<String>>,
    row_kind_counts: Vec<usize>,
}

fn note_value(
    value: &str,
    seen: &mut Vec<String>,
    value_counts: &mut HashMap<String, usize>,
    row_values: &mut Vec<String>,
) {
    if !seen.iter().any(|s| s == value) {
        seen.push(value.to_string());
    }
    *value_counts.entry(value.to_string()).or_insert(0) += 1;
    if !row_values.iter().any(|s| s == value) {
        row_values.push(value.to_string());
    }
}

fn build_stats(events: &[ParsedEvent]) -> SummaryStats {
    let mut severity_counts: Vec<(Severity, usize)> =
        Severity::ALL.iter().map(|&s| (s, 0)).collect();
    let mut functions: HashMap<String, usize> = HashMap::new();
    let mut messages: HashMap<String, usize> = HashMap::new();
    let mut time_range: Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> = None;

    for event in events {
        if let Some(sev) = event.severity {
            if let Some(entry) = severity_counts.iter_mut().find(|(s, _)| *s == sev) {
                entry.1 += 1;
            }
        }
        for probe in FUNCTION_FIELDS {
            if let Some((_, value)) = event.field_ci(probe) {
                *functions.entry(value.to_string()).or_insert(0) += 1;
                break;
            }
        }
        if !event.message.is_empty() {
            *messages
                .entry(truncate(&event.message, 60).to_string())
                .or_insert(0) += 1;
        }
        if let Some(ts) = event.timestamp {
            time_range = Some(match time_range {
                None => (ts, ts),
                Some((from, to)) => (from.min(ts), to.max(ts)),
            });
        }
    }

    SummaryStats {
        rows: events.len(),
        severity_counts,
        top_functions: top_k(functions, TOP_K),
        top_messages: top_k(messages, TOP_K),
        time_range,
    }
}

/// Highest-count entries first; ties break alphabetically for
/// deterministic output.
fn top_k(counts: HashMap<String, usize>, k: usize) -> Vec<(String, usize)> {
    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(k);
    entries
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}\u{2026}")
}
