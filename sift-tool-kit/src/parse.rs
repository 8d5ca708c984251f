//! `parse_json_field` — extract a named field from each row's payload.

use std::future::Future;
use std::pin::Pin;

use sift_core::{DataKind, ParsedEvent, ToolData, ToolResult, WorkingSet};
use sift_tool::{ParamKind, ParamSpec, Tool, ToolInput};

use crate::util::{observed_fields, NO_LOGS};

/// Extract `field` from every row of `ws`, best effort. Returns the raw
/// values (duplicates possible) and the canonical field spelling as seen
/// in the data.
pub(crate) fn extract_field_values(
    ws: &WorkingSet,
    field: &str,
) -> (Vec<String>, Option<String>) {
    let mut values = Vec::new();
    let mut canonical: Option<String> = None;
    for row in ws.rows() {
        let event = ParsedEvent::from_payload(ws.payload(row));
        if let Some((name, value)) = event.field_ci(field) {
            if canonical.is_none() {
                canonical = Some(name.to_string());
            }
            if !value.is_empty() {
                values.push(value.to_string());
            }
        }
    }
    (values, canonical)
}

/// Pulls one named field out of the embedded JSON of each working-set row.
pub struct ParseJsonFieldTool;

impl Tool for ParseJsonFieldTool {
    fn name(&self) -> &str {
        "parse_json_field"
    }

    fn description(&self) -> &str {
        "Extract a named field from the embedded JSON of each row (raw values, duplicates possible)"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "field_name",
            ParamKind::String,
            "field to extract, matched case-insensitively",
        )]
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

            let (values, canonical) = extract_field_values(&ws, &field);
            if values.is_empty() {
                let seen = observed_fields(&ws, 25, 20);
                let hint = if seen.is_empty() {
                    "no JSON fields were decoded from the current rows".to_string()
                } else {
                    format!("fields seen in the data: {}", seen.join(", "))
                };
                return ToolResult::fail(format!(
                    "field '{field}' not found in any of {} rows; {hint}",
                    ws.len()
                ));
            }

            let canonical = canonical.unwrap_or(field);
            let message = format!(
                "Extracted {} {canonical} values from {} rows (raw — may contain duplicates)",
                values.len(),
                ws.len()
            );
            ToolResult::ok(message, ToolData::Values(values), DataKind::RawValues)
                .with_field(canonical)
        })
    }
}
