#![deny(missing_docs)]
//! # sift — umbrella crate
//!
//! A single import surface for the sift engine: answering natural-language
//! questions about large CSV log files by driving a local model through an
//! iterative reason-act loop. Re-exports the member crates behind feature
//! flags, plus a `prelude` for the happy path.

#[cfg(feature = "core")]
pub use sift_catalog;
#[cfg(feature = "core")]
pub use sift_context;
#[cfg(feature = "core")]
pub use sift_core;
#[cfg(feature = "core")]
pub use sift_llm;
#[cfg(feature = "op-react")]
pub use sift_op_react;
#[cfg(feature = "provider-local")]
pub use sift_provider_local;
#[cfg(feature = "core")]
pub use sift_store;
#[cfg(feature = "core")]
pub use sift_tool;
#[cfg(feature = "tools")]
pub use sift_tool_kit;

/// Happy-path imports for composing a sift engine.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use sift_catalog::{CatalogError, EntityCatalog, EntityKind};

    #[cfg(feature = "core")]
    pub use sift_context::{ContextBuilder, SmartSummarizer, SummarizerConfig};

    #[cfg(feature = "core")]
    pub use sift_core::{
        DataKind, Decision, Header, LogRow, QueryOutcome, QueryState, QueryStatus, Severity,
        ToolData, ToolResult, WorkingSet,
    };

    #[cfg(feature = "core")]
    pub use sift_llm::{ChatMessage, ChatRequest, ChatResponse, LlmClient, LlmError};

    #[cfg(feature = "core")]
    pub use sift_store::{LogStore, SearchQuery, StoreError, StoreOptions};

    #[cfg(feature = "core")]
    pub use sift_tool::{ParamKind, ParamSpec, Tool, ToolError, ToolInput, ToolRegistry};

    #[cfg(feature = "tools")]
    pub use sift_tool_kit::standard_registry;

    #[cfg(feature = "op-react")]
    pub use sift_op_react::{EngineConfig, ReactEngine};

    #[cfg(feature = "provider-local")]
    pub use sift_provider_local::LocalChat;
}
