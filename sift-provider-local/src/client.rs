//! Local chat client struct and builder.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use sift_llm::{ChatRequest, ChatResponse, LlmClient, LlmError};

use crate::error::{map_http_status, map_reqwest_error};
use crate::types::{extract_content, to_api_request, ApiResponse};

/// Default model used when the request does not name one.
const DEFAULT_MODEL: &str = "qwen2.5:14b-instruct";

/// Default base URL of a locally served endpoint.
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Base delay for exponential backoff between retries.
const BACKOFF_BASE: Duration = Duration::from_millis(200);

/// Client for a locally served, OpenAI-compatible chat endpoint.
///
/// One `LocalChat` owns one `reqwest::Client` (and so one connection
/// pool); clone-free sharing goes through `Arc<dyn LlmClient>`.
///
/// # Example
///
/// ```no_run
/// use sift_provider_local::LocalChat;
///
/// let client = LocalChat::new()
///     .model("qwen2.5:14b-instruct")
///     .base_url("http://localhost:11434");
/// ```
pub struct LocalChat {
    model: String,
    base_url: String,
    request_timeout: Duration,
    max_retries: u32,
    client: reqwest::Client,
}

impl LocalChat {
    /// Create a client with local-server defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            request_timeout: Duration::from_secs(120),
            max_retries: 3,
            client: reqwest::Client::new(),
        }
    }

    /// Override the default model, used when the request's model is empty.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Per-request timeout. Local models can be slow to first token, so
    /// the default is generous (120 s).
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Retry cap for transient failures (default 3).
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// The chat completions URL.
    pub(crate) fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = to_api_request(request, &self.model);
        let response = self
            .client
            .post(self.chat_url())
            .timeout(self.request_timeout)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(map_http_status(status, &text));
        }

        let decoded: ApiResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::InvalidResponse(format!("response is not valid JSON: {e}")))?;
        extract_content(decoded)
    }
}

impl Default for LocalChat {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for LocalChat {
    /// Send a chat request, retrying transient failures with exponential
    /// backoff plus jitter, up to the configured cap.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut attempt = 0u32;
        loop {
            tracing::debug!(
                url = %self.chat_url(),
                model = %request.model,
                attempt,
                "sending chat request"
            );
            match self.send_once(&request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let jitter = rand::thread_rng().gen_range(0..100u64);
                    let delay = BACKOFF_BASE * 2u32.pow(attempt) + Duration::from_millis(jitter);
                    tracing::warn!(
                        error = %err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient chat failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_local() {
        let client = LocalChat::new();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.max_retries, 3);
    }

    #[test]
    fn builder_overrides() {
        let client = LocalChat::new()
            .model("other")
            .base_url("http://remote:8000")
            .max_retries(1)
            .request_timeout(Duration::from_secs(5));
        assert_eq!(client.model, "other");
        assert_eq!(client.base_url, "http://remote:8000");
        assert_eq!(client.max_retries, 1);
        assert_eq!(client.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn chat_url_includes_path() {
        let client = LocalChat::new().base_url("http://localhost:9999");
        assert_eq!(client.chat_url(), "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn default_impl_matches_new() {
        let client = LocalChat::default();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }
}
