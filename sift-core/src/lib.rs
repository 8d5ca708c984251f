#![deny(missing_docs)]
//! # sift-core — shared types for the sift engine
//!
//! This crate defines the data model every other sift crate speaks:
//!
//! | Concern | Types |
//! |---------|-------|
//! | Log rows | [`Header`], [`LogRow`], [`WorkingSet`] |
//! | Payload decoding | [`ParsedEvent`], [`Severity`] |
//! | Tool envelope | [`ToolResult`], [`ToolData`], [`DataKind`] |
//! | Planner output | [`Decision`] |
//! | Per-query memory | [`QueryState`], [`HistoryEntry`], [`FieldExtraction`] |
//! | Final result | [`QueryOutcome`], [`QueryStatus`] |
//!
//! The working set is shared as `Arc<WorkingSet>`: exactly one is active per
//! query, it is never mutated after publication, and tools borrow it
//! read-only. All payload decoding is best-effort — a malformed payload
//! yields an event with empty fields, never an error.

pub mod decision;
pub mod event;
pub mod log;
pub mod outcome;
pub mod result;
pub mod state;

// Re-exports for convenience
pub use decision::Decision;
pub use event::{ParsedEvent, Severity};
pub use log::{Header, LogRow, WorkingSet};
pub use outcome::{QueryOutcome, QueryStatus};
pub use result::{ChainHop, ChainOutcome, DataKind, ResultMeta, ToolData, ToolResult};
pub use state::{FieldExtraction, HistoryEntry, QueryState};
