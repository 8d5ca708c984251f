//! The concrete sift tool set.
//!
//! Every tool returns the uniform [`sift_core::ToolResult`] envelope with
//! its `DataKind` tag set, and reports expected failures as `ok = false`
//! with a message the planner can act on. File scans run on the blocking
//! pool and honor the per-query cancellation token.
//!
//! [`standard_registry`] wires the full set over shared handles to the
//! log store, the entity catalog, and the chat client.

mod analyze;
mod chain;
mod compose;
mod finalize;
mod grep;
mod group;
mod parse;
mod registry;
mod time;
mod summarize;
mod unique;
mod util;

pub use analyze::AnalyzeLogsTool;
pub use chain::{RelationshipChainTool, RelationshipCountTool, WalkerConfig};
pub use compose::GrepAndParseTool;
pub use finalize::{FinalizeAnswerTool, ReturnLogsTool};
pub use grep::GrepLogsTool;
pub use group::{AggregateByFieldTool, CountUniquePerGroupTool};
pub use parse::ParseJsonFieldTool;
pub use registry::standard_registry;
pub use summarize::SummarizeLogsTool;
pub use time::{ExtractTimeRangeTool, SortByTimeTool};
pub use unique::{CountValuesTool, ExtractUniqueTool};
