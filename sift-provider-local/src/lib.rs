#![deny(missing_docs)]
//! Adapter for a locally served chat endpoint.
//!
//! [`LocalChat`] implements [`sift_llm::LlmClient`] over an OpenAI-style
//! `/v1/chat/completions` endpoint, the interface local model servers
//! conventionally expose. Transient failures are retried with exponential
//! backoff and jitter, bounded by a small retry cap.

mod client;
mod error;
mod types;

pub use client::LocalChat;
