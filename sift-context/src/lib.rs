#![deny(missing_docs)]
//! Context management for the sift loop.
//!
//! Two halves:
//!
//! - [`SmartSummarizer`] compresses a multi-thousand-row working set into
//!   a short, deterministic text block (entity inventory, severity and
//!   time statistics, a handful of representative sample rows) so the
//!   planner can reason about large results inside a bounded prompt.
//! - [`ContextBuilder`] assembles the per-iteration prompt: query,
//!   iteration counter, recent history, current state, an actionable
//!   hint, and the response-format instruction.

pub mod builder;
pub mod summary;

pub use builder::{render_params, ContextBuilder};
pub use summary::{SmartSummarizer, SummarizerConfig, Summary, SummaryStats};
