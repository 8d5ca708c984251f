//! The [`LlmClient`] trait and its error type.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ChatRequest, ChatResponse};

/// Errors from a chat endpoint.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The endpoint timed out.
    #[error("request timed out")]
    Timeout,

    /// The endpoint is overloaded or temporarily down (5xx, 429).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The requested model is not served.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The request was rejected as malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The endpoint's response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl LlmError {
    /// Whether retrying this request might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RequestFailed(_) | LlmError::Timeout | LlmError::ServiceUnavailable(_)
        )
    }
}

/// A chat endpoint. Stateless between calls; implementations may share a
/// connection pool internally.
///
/// Object-safe on purpose: the orchestrator and the analyzer tool hold
/// `Arc<dyn LlmClient>` so planner and analyzer roles can point at the
/// same or different backends.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat request and return the model's response.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(LlmError::Timeout.is_retryable());
        assert!(LlmError::RequestFailed("reset".into()).is_retryable());
        assert!(LlmError::ServiceUnavailable("503".into()).is_retryable());
        assert!(!LlmError::ModelNotFound("x".into()).is_retryable());
        assert!(!LlmError::InvalidRequest("bad".into()).is_retryable());
        assert!(!LlmError::InvalidResponse("bad json".into()).is_retryable());
    }

    #[test]
    fn client_is_object_safe() {
        fn _takes(_: &dyn LlmClient) {}
    }
}
