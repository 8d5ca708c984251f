//! `analyze_logs` — LLM-backed deep analysis of the working set.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sift_core::{DataKind, ParsedEvent, Severity, ToolData, ToolResult, WorkingSet};
use sift_llm::{extract_last_json, ChatMessage, ChatRequest, LlmClient};
use sift_tool::{ParamSpec, Tool, ToolInput};

use crate::util::{truncate, NO_LOGS};

/// Row cap for the analysis sample.
const SAMPLE_CAP: usize = 50;

/// Analyzer calls run warmer than planner calls: the output is prose and
/// hypotheses, not a tool decision.
const ANALYZER_TEMPERATURE: f64 = 0.3;

/// Asks the analyzer model for patterns, anomalies, and a root-cause
/// hypothesis over a severity- and time-spread sample of the working set.
///
/// This is a distinct call from the planner (same endpoint type, its own
/// prompt and temperature), so the two roles can run different models.
pub struct AnalyzeLogsTool {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl AnalyzeLogsTool {
    /// An analyze tool using `model` on the given client.
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

/// Pick up to `cap` rows, higher severities first, spread across the set.
fn pick_sample(ws: &WorkingSet, cap: usize) -> Vec<usize> {
    let severities: Vec<Option<Severity>> = ws
        .rows()
        .iter()
        .map(|row| ParsedEvent::from_payload(ws.payload(row)).severity)
        .collect();

    let mut indices: Vec<usize> = (0..ws.len()).collect();
    indices.sort_by_key(|&idx| std::cmp::Reverse(severities[idx]));
    let mut picked: Vec<usize> = indices.into_iter().take(cap).collect();

    // Top up with an even index spread so the sample is not all one burst.
    if picked.len() < cap.min(ws.len()) {
        let stride = (ws.len() / cap.max(1)).max(1);
        let mut idx = 0;
        while picked.len() < cap.min(ws.len()) && idx < ws.len() {
            if !picked.contains(&idx) {
                picked.push(idx);
            }
            idx += stride;
        }
    }
    picked.sort_unstable();
    picked
}

fn analysis_prompt(ws: &WorkingSet, sample: &[usize], query: &str) -> String {
    let mut out = String::new();
    out.push_str(
        "Analyze the following log sample. Respond with a single JSON object \
         with keys: \"patterns\" (list of strings), \"anomalies\" (list of \
         strings), \"root_cause\" (string — your best hypothesis), and \
         \"summary\" (one short paragraph). The JSON object must be the last \
         content of your reply.\n\n",
    );
    if !query.is_empty() {
        out.push_str(&format!("The user's question: {query}\n\n"));
    }
    out.push_str(&format!(
        "Sample ({} of {} rows, higher severities first in selection):\n",
        sample.len(),
        ws.len()
    ));
    for &idx in sample {
        let row = &ws.rows()[idx];
        out.push_str(&format!(
            "line {}: {}\n",
            row.line_number,
            truncate(ws.payload(row), 200)
        ));
    }
    out
}

impl Tool for AnalyzeLogsTool {
    fn name(&self) -> &str {
        "analyze_logs"
    }

    fn description(&self) -> &str {
        "Deep analysis of the working set: patterns, anomalies, and a root-cause hypothesis"
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
            if ws.is_empty() {
                return ToolResult::fail("the working set is empty — nothing to analyze");
            }

            let sample = pick_sample(&ws, SAMPLE_CAP);
            let prompt = analysis_prompt(&ws, &sample, &input.query);
            let request = ChatRequest::new(
                self.model.clone(),
                vec![ChatMessage::user(prompt)],
            )
            .temperature(ANALYZER_TEMPERATURE);

            let text = match self.llm.chat(request).await {
                Ok(response) => response.content,
                Err(err) => {
                    return ToolResult::fail(format!("analysis call failed: {err}"));
                }
            };

            match extract_last_json(&text)
                .and_then(|j| serde_json::from_str::<serde_json::Value>(j).ok())
            {
                Some(value) => {
                    let message = value
                        .get("summary")
                        .and_then(serde_json::Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| truncate(&text, 200));
                    ToolResult::ok(message, ToolData::Json(value), DataKind::Analysis)
                }
                None => {
                    // The model answered in prose; keep it rather than fail.
                    let message = truncate(&text, 200);
                    ToolResult::ok(message, ToolData::Text(text), DataKind::Analysis)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_support::working_set;
    use async_trait::async_trait;
    use sift_llm::{ChatResponse, LlmError};
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<Vec<Result<String, LlmError>>>,
        last_request: Mutex<Option<ChatRequest>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
            *self.last_request.lock().unwrap() = Some(request);
            self.responses.lock().unwrap().remove(0).map(ChatResponse::new)
        }
    }

    fn corpus() -> Arc<sift_core::WorkingSet> {
        working_set(&[
            r#"2024-03-01T10:00:00Z ERROR {"CmMacAddress": "aa", "message": "ranging failed"}"#,
            r#"2024-03-01T10:01:00Z INFO {"CmMacAddress": "bb", "message": "ok"}"#,
            r#"2024-03-01T10:02:00Z WARN {"CmMacAddress": "cc", "message": "retry"}"#,
        ])
    }

    #[tokio::test]
    async fn structured_analysis_parses() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(r#"Here is my analysis.
            {"patterns": ["ranging failures"], "anomalies": [], "root_cause": "RF noise", "summary": "Mostly ranging failures."}"#
            .to_string())]));
        let tool = AnalyzeLogsTool::new(llm.clone(), "analyzer-model");
        let mut input = ToolInput::from_params(Default::default());
        input.logs = Some(corpus());
        input.query = "why are modems failing?".into();
        let result = tool.execute(input).await;
        assert!(result.ok);
        assert_eq!(result.kind, DataKind::Analysis);
        assert_eq!(result.message, "Mostly ranging failures.");
        match result.data {
            ToolData::Json(value) => {
                assert_eq!(value["root_cause"], "RF noise");
            }
            other => panic!("expected json, got {other:?}"),
        }

        // The analyzer request uses its own temperature and model, and
        // carries the sample plus the original question.
        let request = llm.last_request.lock().unwrap().take().unwrap();
        assert_eq!(request.model, "analyzer-model");
        assert_eq!(request.temperature, ANALYZER_TEMPERATURE);
        assert!(request.messages[0].content.contains("why are modems failing?"));
        assert!(request.messages[0].content.contains("ranging failed"));
    }

    #[tokio::test]
    async fn prose_reply_is_kept_not_failed() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(
            "The logs look mostly healthy.".to_string()
        )]));
        let tool = AnalyzeLogsTool::new(llm, "m");
        let mut input = ToolInput::from_params(Default::default());
        input.logs = Some(corpus());
        let result = tool.execute(input).await;
        assert!(result.ok);
        assert!(matches!(result.data, ToolData::Text(_)));
    }

    #[tokio::test]
    async fn llm_failure_is_a_tool_failure() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(LlmError::Timeout)]));
        let tool = AnalyzeLogsTool::new(llm, "m");
        let mut input = ToolInput::from_params(Default::default());
        input.logs = Some(corpus());
        let result = tool.execute(input).await;
        assert!(!result.ok);
        assert!(result.message.contains("analysis call failed"));
    }

    #[tokio::test]
    async fn empty_working_set_fails() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let tool = AnalyzeLogsTool::new(llm, "m");
        let mut input = ToolInput::from_params(Default::default());
        input.logs = Some(working_set(&[]));
        let result = tool.execute(input).await;
        assert!(!result.ok);
    }

    #[test]
    fn sample_prioritizes_severity_and_is_bounded() {
        let payloads: Vec<String> = (0..200)
            .map(|i| {
                let sev = if i == 150 { "ERROR" } else { "INFO" };
                format!(r#"2024-03-01T10:00:00Z {sev} {{"n": {i}}}"#)
            })
            .collect();
        let refs: Vec<&str> = payloads.iter().map(String::as_str).collect();
        let ws = working_set(&refs);
        let sample = pick_sample(&ws, SAMPLE_CAP);
        assert!(sample.len() <= SAMPLE_CAP);
        assert!(sample.contains(&150), "highest severity row must be sampled");
    }
}
