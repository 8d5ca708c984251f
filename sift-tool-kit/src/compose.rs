//! `grep_and_parse` — search-then-extract in one step.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::json;
use sift_core::{DataKind, ToolData, ToolResult};
use sift_store::{LogStore, SearchQuery, StoreError};
use sift_tool::{ParamKind, ParamSpec, Tool, ToolInput};

use crate::parse::extract_field_values;
use crate::util::dedup_first_occurrence;

/// Convenience composition of `grep_logs` and `parse_json_field`,
/// optionally deduplicating. Semantics equal the two-step chain.
pub struct GrepAndParseTool {
    store: Arc<LogStore>,
}

impl GrepAndParseTool {
    /// A composed tool over the shared store.
    pub fn new(store: Arc<LogStore>) -> Self {
        Self { store }
    }
}

impl Tool for GrepAndParseTool {
    fn name(&self) -> &str {
        "grep_and_parse"
    }

    fn description(&self) -> &str {
        "Search for a pattern and extract a field from the matches in one step"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("pattern", ParamKind::String, "text to search for"),
            ParamSpec::required("field_name", ParamKind::String, "field to extract"),
            ParamSpec::with_default(
                "unique_only",
                ParamKind::Bool,
                json!(false),
                "deduplicate the extracted values",
            ),
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
        ]
    }

    fn execute(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let pattern = input.str_param("pattern").unwrap_or_default().to_string();
            let field = input.str_param("field_name").unwrap_or_default().to_string();
            let unique_only = input.bool_param("unique_only").unwrap_or(false);

            let mut query = SearchQuery::new(&pattern)
                .case_sensitive(input.bool_param("case_sensitive").unwrap_or(false))
                .regex(input.bool_param("regex").unwrap_or(false));
            if let Some(limit) = input.usize_param("max_results") {
                query = query.max_matches(limit);
            }

            let store = Arc::clone(&self.store);
            let cancel = input.cancel.clone();
            let outcome =
                match tokio::task::spawn_blocking(move || store.search(&query, &cancel)).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(StoreError::InvalidPattern(msg))) => {
                        return ToolResult::fail(format!(
                            "invalid regular expression '{pattern}': {msg}"
                        ));
                    }
                    Ok(Err(err)) => return ToolResult::fail(format!("search failed: {err}")),
                    Err(join) => return ToolResult::fail(format!("search task failed: {join}")),
                };

            if outcome.working_set.is_empty() {
                return ToolResult::fail(format!(
                    "no rows matched '{pattern}' ({} lines scanned) — nothing to parse",
                    outcome.lines_scanned
                ));
            }

            let (values, canonical) = extract_field_values(&outcome.working_set, &field);
            if values.is_empty() {
                return ToolResult::fail(format!(
                    "matched {} rows for '{pattern}' but none carried field '{field}'",
                    outcome.working_set.len()
                ));
            }
            let canonical = canonical.unwrap_or(field);
            let raw_count = values.len();

            let (data, kind, message) = if unique_only {
                let unique = dedup_first_occurrence(&values);
                let message = format!(
                    "Matched '{pattern}', extracted {} unique {canonical} values (from {raw_count} raw)",
                    unique.len()
                );
                (ToolData::Values(unique), DataKind::UniqueValues, message)
            } else {
                let message = format!(
                    "Matched '{pattern}', extracted {raw_count} {canonical} values (raw — may contain duplicates)"
                );
                (ToolData::Values(values), DataKind::RawValues, message)
            };

            ToolResult::ok(message, data, kind)
                .with_field(canonical)
                .with_lines_scanned(outcome.lines_scanned)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_support::{params, store_with};

    fn rows() -> Vec<String> {
        vec![
            r#"t1,h,"{""CmMacAddress"": ""aa""}""#.to_string(),
            r#"t2,h,"{""CmMacAddress"": ""bb""}""#.to_string(),
            r#"t3,h,"{""CmMacAddress"": ""aa""}""#.to_string(),
        ]
    }

    #[tokio::test]
    async fn composed_raw_extraction() {
        let lines = rows();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (_file, store) = store_with(&refs);
        let tool = GrepAndParseTool::new(store);
        let result = tool
            .execute(ToolInput::from_params(params(&[
                ("pattern", serde_json::json!("CmMacAddress")),
                ("field_name", serde_json::json!("CmMacAddress")),
            ])))
            .await;
        assert!(result.ok);
        assert_eq!(result.kind, DataKind::RawValues);
        assert_eq!(result.data.values().unwrap(), ["aa", "bb", "aa"]);
    }

    #[tokio::test]
    async fn composed_unique_extraction() {
        let lines = rows();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (_file, store) = store_with(&refs);
        let tool = GrepAndParseTool::new(store);
        let result = tool
            .execute(ToolInput::from_params(params(&[
                ("pattern", serde_json::json!("CmMacAddress")),
                ("field_name", serde_json::json!("CmMacAddress")),
                ("unique_only", serde_json::json!(true)),
            ])))
            .await;
        assert_eq!(result.kind, DataKind::UniqueValues);
        assert_eq!(result.data.values().unwrap(), ["aa", "bb"]);
    }

    #[tokio::test]
    async fn zero_matches_fails_with_message() {
        let (_file, store) = store_with(&[r#"t1,h,"{""A"": 1}""#]);
        let tool = GrepAndParseTool::new(store);
        let result = tool
            .execute(ToolInput::from_params(params(&[
                ("pattern", serde_json::json!("missing")),
                ("field_name", serde_json::json!("A")),
            ])))
            .await;
        assert!(!result.ok);
        assert!(result.message.contains("no rows matched"));
    }

    #[tokio::test]
    async fn matches_without_field_fail_with_message() {
        let (_file, store) = store_with(&[r#"t1,h,"{""A"": 1}""#]);
        let tool = GrepAndParseTool::new(store);
        let result = tool
            .execute(ToolInput::from_params(params(&[
                ("pattern", serde_json::json!("A")),
                ("field_name", serde_json::json!("Bogus")),
            ])))
            .await;
        assert!(!result.ok);
        assert!(result.message.contains("Bogus"));
    }
}
