#![deny(missing_docs)]
//! Streaming access to a header-prefixed, character-separated log file.
//!
//! [`LogStore`] discovers the schema from the header line at open time and
//! exposes the file as a streaming text source: [`LogStore::search`] walks
//! the file record by record, holding one record in memory at a time, and
//! stops early when a match cap is reached. Matching runs in substring or
//! regex mode, optionally restricted to a subset of columns.
//!
//! Records follow quoted-CSV conventions: fields may be quoted, quotes are
//! escaped by doubling, and a quoted field may span physical lines.

mod error;
mod record;
mod store;

pub use error::StoreError;
pub use store::{LogStore, SearchOutcome, SearchQuery, StoreOptions};
