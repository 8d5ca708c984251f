#![deny(missing_docs)]
//! The chat boundary between sift and a local LLM endpoint.
//!
//! [`LlmClient`] is the object-safe trait the orchestrator and the
//! analyzer tool call through; `sift-provider-local` implements it over
//! HTTP. The [`decision`] module turns raw planner text into a
//! [`sift_core::Decision`]: it strips reasoning markers, extracts the last
//! balanced JSON object, and validates the `{reasoning, action, params}`
//! shape. Malformed output becomes `Decision::Invalid`, never an error.

pub mod client;
pub mod decision;
pub mod types;

pub use client::{LlmClient, LlmError};
pub use decision::{extract_last_json, parse_decision, strip_reasoning};
pub use types::{ChatMessage, ChatRequest, ChatResponse, ChatRole};
