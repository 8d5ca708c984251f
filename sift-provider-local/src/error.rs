//! Internal helpers mapping HTTP and reqwest errors to [`LlmError`].

use sift_llm::LlmError;

/// Map an HTTP status code from the chat endpoint to an [`LlmError`].
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> LlmError {
    match status.as_u16() {
        404 => LlmError::ModelNotFound(body.to_string()),
        400 => LlmError::InvalidRequest(body.to_string()),
        429 => LlmError::ServiceUnavailable(body.to_string()),
        500..=599 => LlmError::ServiceUnavailable(body.to_string()),
        _ => LlmError::InvalidRequest(format!("HTTP {status}: {body}")),
    }
}

/// Map a [`reqwest::Error`] to an [`LlmError`].
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::RequestFailed(err.to_string())
    }
}
