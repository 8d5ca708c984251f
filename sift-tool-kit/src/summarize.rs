//! `summarize_logs` — statistics overview of the working set.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sift_catalog::EntityCatalog;
use sift_context::SmartSummarizer;
use sift_core::{DataKind, ToolData, ToolResult};
use sift_tool::{ParamSpec, Tool, ToolInput};

use crate::util::NO_LOGS;

/// Renders the smart summarizer's statistics view on demand: row count,
/// severity distribution, time range, top entities per kind, top
/// functions and messages.
pub struct SummarizeLogsTool {
    summarizer: SmartSummarizer,
}

impl SummarizeLogsTool {
    /// A summarize tool over the shared catalog.
    pub fn new(catalog: Arc<EntityCatalog>) -> Self {
        Self {
            summarizer: SmartSummarizer::new(catalog),
        }
    }
}

impl Tool for SummarizeLogsTool {
    fn name(&self) -> &str {
        "summarize_logs"
    }

    fn description(&self) -> &str {
        "Produce a statistics overview of the working set (severities, entities, time range)"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![]
    }

    fn requires_logs(&self) -> bool {
        true
    }

    fn execute(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let Some(ws) = input.logs.clone() else {
                return ToolResult::fail(NO_LOGS);
            };
            let summary = self.summarizer.summarize(&ws, Some(&input.query));
            let message = format!("Statistics overview of {} rows", ws.len());
            ToolResult::ok(message, ToolData::Text(summary.text), DataKind::Metadata)
        })
    }
}
