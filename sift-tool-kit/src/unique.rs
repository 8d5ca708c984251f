//! `extract_unique` and `count_values` — deduplication and counting.

use std::future::Future;
use std::pin::Pin;

use sift_core::{DataKind, ToolData, ToolResult};
use sift_tool::{ParamKind, ParamSpec, Tool, ToolInput};

use crate::parse::extract_field_values;
use crate::util::{dedup_first_occurrence, effective_values, looks_like_field_names, NO_VALUES};

/// The value list to operate on, after correcting the common planner
/// mistake of passing field names where values belong: a short PascalCase
/// list with logs available triggers an implicit field extraction.
fn resolve_values(input: &ToolInput) -> Result<(Vec<String>, Option<String>, bool), ToolResult> {
    let Some((values, substituted)) = effective_values(input) else {
        return Err(ToolResult::fail(NO_VALUES));
    };

    if looks_like_field_names(&values) {
        if let Some(ws) = &input.logs {
            for candidate in &values {
                let (extracted, canonical) = extract_field_values(ws, candidate);
                if !extracted.is_empty() {
                    tracing::debug!(
                        field = %candidate,
                        count = extracted.len(),
                        "treated value list as a field name and extracted it"
                    );
                    return Ok((extracted, canonical, substituted));
                }
            }
        }
    }

    Ok((values, input.values_field.clone(), substituted))
}

/// Deduplicate a value list, preserving first occurrence.
pub struct ExtractUniqueTool;

impl Tool for ExtractUniqueTool {
    fn name(&self) -> &str {
        "extract_unique"
    }

    fn description(&self) -> &str {
        "Deduplicate a list of values, keeping first occurrence order"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::optional(
            "values",
            ParamKind::StringList,
            "values to deduplicate; the last extracted list is used when omitted",
        )]
    }

    fn requires_logs(&self) -> bool {
        true
    }

    fn execute(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let (values, field, substituted) = match resolve_values(&input) {
                Ok(v) => v,
                Err(fail) => return fail,
            };
            let unique = dedup_first_occurrence(&values);
            let mut message = format!(
                "{} unique values (from {} raw)",
                unique.len(),
                values.len()
            );
            if substituted {
                message.push_str("; the supplied sample was replaced with the full list");
            }
            let mut result =
                ToolResult::ok(message, ToolData::Values(unique), DataKind::UniqueValues);
            if let Some(field) = field {
                result = result.with_field(field);
            }
            result
        })
    }
}

/// Count unique and total values in a list.
pub struct CountValuesTool;

impl Tool for CountValuesTool {
    fn name(&self) -> &str {
        "count_values"
    }

    fn description(&self) -> &str {
        "Count unique and total values in a list — the final step for 'how many' questions"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::optional(
            "values",
            ParamKind::StringList,
            "values to count; the last extracted list is used when omitted",
        )]
    }

    fn requires_logs(&self) -> bool {
        true
    }

    fn execute(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let (values, field, substituted) = match resolve_values(&input) {
                Ok(v) => v,
                Err(fail) => return fail,
            };
            let unique = dedup_first_occurrence(&values).len() as u64;
            let total = values.len() as u64;
            let mut message = format!("{unique} unique values out of {total} total");
            if substituted {
                message.push_str("; the supplied sample was replaced with the full list");
            }
            let mut result = ToolResult::ok(
                message,
                ToolData::Count { unique, total },
                DataKind::FinalCount,
            );
            if let Some(field) = field {
                result = result.with_field(field);
            }
            result
        })
    }
}
