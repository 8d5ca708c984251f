//! Wire types for the OpenAI-style chat completions endpoint.

use serde::{Deserialize, Serialize};
use sift_llm::{ChatRequest, ChatResponse, ChatRole, LlmError};

#[derive(Debug, Serialize)]
pub(crate) struct ApiRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse {
    #[serde(default)]
    pub choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiChoice {
    pub message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Map a [`ChatRequest`] to the endpoint's JSON shape.
pub(crate) fn to_api_request(request: &ChatRequest, default_model: &str) -> ApiRequest {
    let model = if request.model.is_empty() {
        default_model.to_string()
    } else {
        request.model.clone()
    };
    ApiRequest {
        model,
        messages: request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: m.content.clone(),
            })
            .collect(),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        stream: false,
    }
}

/// Map a decoded wire response back to the internal [`ChatResponse`].
pub(crate) fn extract_content(response: ApiResponse) -> Result<ChatResponse, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(ChatResponse::new)
        .ok_or_else(|| LlmError::InvalidResponse("response carried no message content".into()))
}
