//! `grep_logs` — streaming search over the log file.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::json;
use sift_core::{DataKind, ToolData, ToolResult};
use sift_store::{LogStore, SearchQuery, StoreError};
use sift_tool::{ParamKind, ParamSpec, Tool, ToolInput};

/// Streaming substring/regex search producing a new working set.
pub struct GrepLogsTool {
    store: Arc<LogStore>,
}

impl GrepLogsTool {
    /// A grep tool over the shared store.
    pub fn new(store: Arc<LogStore>) -> Self {
        Self { store }
    }
}

impl Tool for GrepLogsTool {
    fn name(&self) -> &str {
        "grep_logs"
    }

    fn description(&self) -> &str {
        "Search the log file for a pattern and load matching rows as the working set"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("pattern", ParamKind::String, "text or regex to search for"),
            ParamSpec::with_default(
                "case_sensitive",
                ParamKind::Bool,
                json!(false),
                "match case exactly",
            ),
            ParamSpec::with_default(
                "regex",
                ParamKind::Bool,
                json!(false),
                "treat the pattern as a regular expression",
            ),
            ParamSpec::optional("max_results", ParamKind::Int, "stop after this many matches"),
            ParamSpec::optional(
                "columns",
                ParamKind::StringList,
                "restrict matching to these columns",
            ),
        ]
    }

    fn execute(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let pattern = input.str_param("pattern").unwrap_or_default().to_string();
            let mut query = SearchQuery::new(&pattern)
                .case_sensitive(input.bool_param("case_sensitive").unwrap_or(false))
                .regex(input.bool_param("regex").unwrap_or(false));
            if let Some(limit) = input.usize_param("max_results") {
                query = query.max_matches(limit);
            }
            if let Some(columns) = input.list_param("columns") {
                if !columns.is_empty() {
                    query = query.columns(columns);
                }
            }

            let store = Arc::clone(&self.store);
            let cancel = input.cancel.clone();
            let outcome =
                tokio::task::spawn_blocking(move || store.search(&query, &cancel)).await;

            let outcome = match outcome {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(StoreError::InvalidPattern(msg))) => {
                    return ToolResult::fail(format!(
                        "invalid regular expression '{pattern}': {msg}"
                    ));
                }
                Ok(Err(StoreError::UnknownColumn { name, available })) => {
                    return ToolResult::fail(format!(
                        "unknown column '{name}'; available columns: {available}"
                    ));
                }
                Ok(Err(StoreError::Cancelled)) => {
                    return ToolResult::fail("search cancelled");
                }
                Ok(Err(err)) => return ToolResult::fail(format!("search failed: {err}")),
                Err(join) => return ToolResult::fail(format!("search task failed: {join}")),
            };

            let rows = outcome.working_set.len();
            let scanned = outcome.lines_scanned;
            let message = if rows == 0 {
                format!("No rows matched '{pattern}' ({scanned} lines scanned)")
            } else {
                format!(
                    "Found {rows} rows matching '{pattern}' ({scanned} lines scanned). \
                     Rows are raw log lines — extracted values may contain duplicates."
                )
            };
            tracing::debug!(pattern = %pattern, rows, scanned, "grep_logs complete");
            ToolResult::ok(
                message,
                ToolData::Table(Arc::new(outcome.working_set)),
                DataKind::RawLogs,
            )
            .with_lines_scanned(scanned)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_support::{store_with, params};

    #[tokio::test]
    async fn grep_produces_working_set() {
        let (_file, store) = store_with(&[
            r#"t1,h,"alpha one""#,
            r#"t2,h,"beta two""#,
            r#"t3,h,"alpha three""#,
        ]);
        let tool = GrepLogsTool::new(store);
        let result = tool
            .execute(ToolInput::from_params(params(&[("pattern", json!("alpha"))])))
            .await;
        assert!(result.ok);
        assert_eq!(result.kind, DataKind::RawLogs);
        assert!(result.message.contains("duplicates"));
        match result.data {
            ToolData::Table(ws) => assert_eq!(ws.len(), 2),
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn grep_zero_matches_is_success() {
        let (_file, store) = store_with(&[r#"t1,h,"alpha""#]);
        let tool = GrepLogsTool::new(store);
        let result = tool
            .execute(ToolInput::from_params(params(&[(
                "pattern",
                json!("nothing"),
            )])))
            .await;
        assert!(result.ok);
        assert!(result.message.contains("No rows matched"));
    }

    #[tokio::test]
    async fn grep_invalid_regex_fails_cleanly() {
        let (_file, store) = store_with(&[r#"t1,h,"alpha""#]);
        let tool = GrepLogsTool::new(store);
        let result = tool
            .execute(ToolInput::from_params(params(&[
                ("pattern", json!("(unclosed")),
                ("regex", json!(true)),
            ])))
            .await;
        assert!(!result.ok);
        assert!(result.message.contains("invalid regular expression"));
    }

    #[tokio::test]
    async fn grep_respects_max_results() {
        let lines: Vec<String> = (0..40).map(|i| format!(r#"t{i},h,"needle {i}""#)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (_file, store) = store_with(&refs);
        let tool = GrepLogsTool::new(store);
        let result = tool
            .execute(ToolInput::from_params(params(&[
                ("pattern", json!("needle")),
                ("max_results", json!(5)),
            ])))
            .await;
        match result.data {
            ToolData::Table(ws) => assert_eq!(ws.len(), 5),
            other => panic!("expected table, got {other:?}"),
        }
    }
}
