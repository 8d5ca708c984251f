//! Group-by aggregation: `count_unique_per_group` and
//! `aggregate_by_field`.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use serde_json::json;
use sift_core::{DataKind, ParsedEvent, ToolData, ToolResult};
use sift_tool::{ParamKind, ParamSpec, Tool, ToolInput};

use crate::util::{observed_fields, NO_LOGS};

fn sort_and_truncate(mut counts: Vec<(String, u64)>, top_n: usize) -> Vec<(String, u64)> {
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts.truncate(top_n);
    counts
}

/// Group working-set rows by one field, counting distinct values of
/// another field per group.
pub struct CountUniquePerGroupTool;

impl Tool for CountUniquePerGroupTool {
    fn name(&self) -> &str {
        "count_unique_per_group"
    }

    fn description(&self) -> &str {
        "Group rows by one field and count distinct values of another field per group"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("group_by", ParamKind::String, "field to group rows by"),
            ParamSpec::required(
                "count_field",
                ParamKind::String,
                "field whose distinct values are counted per group",
            ),
            ParamSpec::with_default("top_n", ParamKind::Int, json!(10), "groups to keep"),
        ]
    }

    fn requires_logs(&self) -> bool {
        true
    }

    fn execute(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let Some(ws) = input.logs.clone() else {
                return ToolResult::fail(NO_LOGS);
            };
            let group_by = input.str_param("group_by").unwrap_or_default().to_string();
            let count_field = input
                .str_param("count_field")
                .unwrap_or_default()
                .to_string();
            let top_n = input.usize_param("top_n").unwrap_or(10).max(1);

            // Both fields must be present on the same row to contribute.
            let mut groups: Vec<(String, BTreeSet<String>)> = Vec::new();
            let mut rows_with_group = 0usize;
            for row in ws.rows() {
                let event = ParsedEvent::from_payload(ws.payload(row));
                let Some((_, group)) = event.field_ci(&group_by) else {
                    continue;
                };
                rows_with_group += 1;
                let Some((_, counted)) = event.field_ci(&count_field) else {
                    continue;
                };
                if counted.is_empty() {
                    continue;
                }
                match groups.iter_mut().find(|(g, _)| g == group) {
                    Some((_, set)) => {
                        set.insert(counted.to_string());
                    }
                    None => {
                        let mut set = BTreeSet::new();
                        set.insert(counted.to_string());
                        groups.push((group.to_string(), set));
                    }
                }
            }

            if rows_with_group == 0 {
                let seen = observed_fields(&ws, 25, 20);
                return ToolResult::fail(format!(
                    "field '{group_by}' not present in any of {} rows; fields seen: {}",
                    ws.len(),
                    seen.join(", ")
                ));
            }
            if groups.is_empty() {
                return ToolResult::fail(format!(
                    "rows carry '{group_by}' but none also carry '{count_field}' — \
                     both fields must appear on the same rows"
                ));
            }

            let counts: Vec<(String, u64)> = groups
                .into_iter()
                .map(|(group, set)| (group, set.len() as u64))
                .collect();
            let counts = sort_and_truncate(counts, top_n);
            let message = format!(
                "Top {} {group_by} groups by distinct {count_field}: {}",
                counts.len(),
                counts
                    .iter()
                    .map(|(g, n)| format!("{g}={n}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            ToolResult::ok(message, ToolData::Counts(counts), DataKind::Aggregated)
        })
    }
}

/// Occurrence counts of one field's values across the working set.
pub struct AggregateByFieldTool;

impl Tool for AggregateByFieldTool {
    fn name(&self) -> &str {
        "aggregate_by_field"
    }

    fn description(&self) -> &str {
        "Count how many rows carry each value of a field, most frequent first"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("field_name", ParamKind::String, "field to aggregate on"),
            ParamSpec::with_default("top_n", ParamKind::Int, json!(10), "groups to keep"),
        ]
    }

    fn requires_logs(&self) -> bool {
        true
    }

    fn execute(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let Some(ws) = input.logs.clone() else {
                return ToolResult::fail(NO_LOGS);
            };
            let field = input.str_param("field_name").unwrap_or_default().to_string();
            let top_n = input.usize_param("top_n").unwrap_or(10).max(1);

            let mut counts: Vec<(String, u64)> = Vec::new();
            for row in ws.rows() {
                let event = ParsedEvent::from_payload(ws.payload(row));
                let Some((_, value)) = event.field_ci(&field) else {
                    continue;
                };
                if value.is_empty() {
                    continue;
                }
                match counts.iter_mut().find(|(v, _)| v == value) {
                    Some(entry) => entry.1 += 1,
                    None => counts.push((value.to_string(), 1)),
                }
            }

            if counts.is_empty() {
                let seen = observed_fields(&ws, 25, 20);
                return ToolResult::fail(format!(
                    "field '{field}' not present in any of {} rows; fields seen: {}",
                    ws.len(),
                    seen.join(", ")
                ));
            }

            let counts = sort_and_truncate(counts, top_n);
            let message = format!(
                "Row counts by {field}: {}",
                counts
                    .iter()
                    .map(|(v, n)| format!("{v}={n}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            ToolResult::ok(message, ToolData::Counts(counts), DataKind::Aggregated)
        })
    }
}
