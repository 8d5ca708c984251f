//! Display formatting and the terminal tool: `return_logs` and
//! `finalize_answer`.

use std::future::Future;
use std::pin::Pin;

use serde_json::json;
use sift_core::{DataKind, ToolData, ToolResult};
use sift_tool::{ParamKind, ParamSpec, Tool, ToolInput};

use crate::util::{truncate, NO_LOGS};

/// Formats a handful of working-set rows for display.
pub struct ReturnLogsTool;

impl Tool for ReturnLogsTool {
    fn name(&self) -> &str {
        "return_logs"
    }

    fn description(&self) -> &str {
        "Format a few working-set rows for display"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::with_default(
            "max_samples",
            ParamKind::Int,
            json!(10),
            "rows to format",
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
            let max_samples = input.usize_param("max_samples").unwrap_or(10).max(1);

            let lines: Vec<String> = ws
                .rows()
                .iter()
                .take(max_samples)
                .map(|row| format!("line {}: {}", row.line_number, truncate(ws.payload(row), 200)))
                .collect();
            let shown = lines.len();
            let message = format!("Formatted {shown} of {} rows", ws.len());
            ToolResult::ok(
                message,
                ToolData::Text(lines.join("\n")),
                DataKind::Formatted,
            )
        })
    }
}

/// The terminal tool. The orchestrator breaks the loop on seeing this
/// action; executing it just echoes the answer in the terminal envelope.
pub struct FinalizeAnswerTool;

impl Tool for FinalizeAnswerTool {
    fn name(&self) -> &str {
        "finalize_answer"
    }

    fn description(&self) -> &str {
        "Finish the query and present the final answer"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("answer", ParamKind::String, "the final answer"),
            ParamSpec::optional(
                "confidence",
                ParamKind::Any,
                "confidence in the answer, 0 to 1",
            ),
        ]
    }

    fn execute(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let answer = input.str_param("answer").unwrap_or_default().to_string();
            if answer.is_empty() {
                return ToolResult::fail("finalize_answer requires a non-empty 'answer'");
            }
            ToolResult::ok(answer.clone(), ToolData::Text(answer), DataKind::Terminal)
        })
    }
}
