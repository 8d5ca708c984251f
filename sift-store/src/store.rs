//! The log store: schema discovery and streaming search.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::RegexBuilder;
use sift_core::{Header, LogRow, WorkingSet};
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::record::{read_record, split_record};

/// How many records to scan between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 512;

/// Header names conventionally holding the full event payload, probed in
/// order when no payload column is configured.
const PAYLOAD_CONVENTIONS: &[&str] = &["message", "payload", "data", "raw", "log"];

/// Options for opening a log store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Field delimiter. Defaults to `,`.
    pub delimiter: u8,
    /// Name of the payload column. When `None`, a conventional header
    /// match is probed, falling back to the last column.
    pub payload_column: Option<String>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            payload_column: None,
        }
    }
}

/// A streaming search request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Pattern to match (substring by default).
    pub pattern: String,
    /// Restrict matching to these columns; `None` matches the whole record.
    pub columns: Option<Vec<String>>,
    /// Case-sensitive matching. Defaults to `false`.
    pub case_sensitive: bool,
    /// Treat the pattern as a regular expression. Defaults to `false`.
    pub regex: bool,
    /// Stop after this many matches.
    pub max_matches: Option<usize>,
}

impl SearchQuery {
    /// A case-insensitive substring query over all columns.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            columns: None,
            case_sensitive: false,
            regex: false,
            max_matches: None,
        }
    }

    /// Restrict matching to the named columns.
    #[must_use]
    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Switch case-sensitive matching on or off.
    #[must_use]
    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    /// Treat the pattern as a regular expression.
    #[must_use]
    pub fn regex(mut self, yes: bool) -> Self {
        self.regex = yes;
        self
    }

    /// Stop scanning after this many matches.
    #[must_use]
    pub fn max_matches(mut self, limit: usize) -> Self {
        self.max_matches = Some(limit);
        self
    }
}

/// Result of a streaming search.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Matching rows, in file order.
    pub working_set: WorkingSet,
    /// Records visited before the scan stopped.
    pub lines_scanned: u64,
}

enum Matcher {
    Substring {
        needle: String,
        case_sensitive: bool,
    },
    Regex(regex::Regex),
}

impl Matcher {
    fn build(query: &SearchQuery) -> Result<Matcher, StoreError> {
        if query.regex {
            let compiled = RegexBuilder::new(&query.pattern)
                .case_insensitive(!query.case_sensitive)
                .build()
                .map_err(|e| StoreError::InvalidPattern(e.to_string()))?;
            Ok(Matcher::Regex(compiled))
        } else if query.case_sensitive {
            Ok(Matcher::Substring {
                needle: query.pattern.clone(),
                case_sensitive: true,
            })
        } else {
            Ok(Matcher::Substring {
                needle: query.pattern.to_lowercase(),
                case_sensitive: false,
            })
        }
    }

    fn matches(&self, haystack: &str) -> bool {
        match self {
            Matcher::Substring {
                needle,
                case_sensitive: true,
            } => haystack.contains(needle.as_str()),
            Matcher::Substring { needle, .. } => haystack.to_lowercase().contains(needle.as_str()),
            Matcher::Regex(re) => re.is_match(haystack),
        }
    }
}

/// Byte-level streaming access to a character-separated log file.
///
/// The header is read once at open time; every scan re-opens the file, so
/// concurrent searches are safe and the store itself stays immutable.
#[derive(Debug)]
pub struct LogStore {
    path: PathBuf,
    header: Arc<Header>,
    payload_index: usize,
    delimiter: u8,
}

impl LogStore {
    /// Open a log file, read its header, and resolve the payload column.
    pub fn open(path: impl Into<PathBuf>, options: StoreOptions) -> Result<Self, StoreError> {
        let path = path.into();
        let file = File::open(&path)?;
        let mut reader = BufReader::new(file);
        let mut buf = String::new();
        if read_record(&mut reader, &mut buf)? == 0 {
            return Err(StoreError::EmptyFile);
        }
        let columns = split_record(&buf, options.delimiter);
        let header = Arc::new(Header::new(columns));

        let payload_index = match &options.payload_column {
            Some(name) => header
                .position(name)
                .ok_or_else(|| StoreError::UnknownColumn {
                    name: name.clone(),
                    available: header.columns().join(", "),
                })?,
            None => resolve_payload_convention(&header),
        };

        tracing::debug!(
            path = %path.display(),
            columns = header.len(),
            payload = %header.columns()[payload_index],
            "opened log store"
        );

        Ok(Self {
            path,
            header,
            payload_index,
            delimiter: options.delimiter,
        })
    }

    /// The discovered header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// A cheap clone of the header handle.
    pub fn header_arc(&self) -> Arc<Header> {
        Arc::clone(&self.header)
    }

    /// Index of the payload column.
    pub fn payload_index(&self) -> usize {
        self.payload_index
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream the file and collect rows matching `query`, preserving file
    /// order. Memory stays bounded by one record plus the match buffer;
    /// the scan stops early at `max_matches` and honors `cancel` between
    /// record batches.
    pub fn search(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, StoreError> {
        let matcher = Matcher::build(query)?;
        let column_indices = self.resolve_columns(query.columns.as_deref())?;
        let limit = query.max_matches.unwrap_or(usize::MAX);

        let mut rows = Vec::new();
        let mut scanned = 0u64;
        self.scan(cancel, |record_number, record| {
            scanned = record_number;
            let fields = split_record(record, self.delimiter);
            if record_matches(&matcher, &column_indices, record, &fields) {
                rows.push(LogRow {
                    line_number: record_number,
                    fields,
                });
            }
            rows.len() < limit
        })?;

        tracing::debug!(
            pattern = %query.pattern,
            matches = rows.len(),
            scanned,
            "search complete"
        );

        Ok(SearchOutcome {
            working_set: WorkingSet::new(self.header_arc(), self.payload_index, rows),
            lines_scanned: scanned,
        })
    }

    /// Count records matching `query` without materializing them.
    pub fn count_matches(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<u64, StoreError> {
        let matcher = Matcher::build(query)?;
        let column_indices = self.resolve_columns(query.columns.as_deref())?;

        let mut count = 0u64;
        self.scan(cancel, |_, record| {
            let fields = split_record(record, self.delimiter);
            if record_matches(&matcher, &column_indices, record, &fields) {
                count += 1;
            }
            true
        })?;
        Ok(count)
    }

    /// Walk every record after the header, invoking `visit` with the
    /// 1-based record number and the raw record text. `visit` returns
    /// `false` to stop early.
    fn scan<F>(&self, cancel: &CancellationToken, mut visit: F) -> Result<(), StoreError>
    where
        F: FnMut(u64, &str) -> bool,
    {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::with_capacity(64 * 1024, file);
        let mut buf = String::new();

        // Skip the header record.
        if read_record(&mut reader, &mut buf)? == 0 {
            return Ok(());
        }

        let mut record_number = 0u64;
        loop {
            if read_record(&mut reader, &mut buf)? == 0 {
                return Ok(());
            }
            record_number += 1;
            if record_number % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            if buf.is_empty() {
                continue;
            }
            if !visit(record_number, &buf) {
                return Ok(());
            }
        }
    }

    fn resolve_columns(
        &self,
        columns: Option<&[String]>,
    ) -> Result<Option<Vec<usize>>, StoreError> {
        let names = match columns {
            Some(names) if !names.is_empty() => names,
            _ => return Ok(None),
        };
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .header
                .position(name)
                .ok_or_else(|| StoreError::UnknownColumn {
                    name: name.clone(),
                    available: self.header.columns().join(", "),
                })?;
            indices.push(idx);
        }
        Ok(Some(indices))
    }
}

fn record_matches(
    matcher: &Matcher,
    column_indices: &Option<Vec<usize>>,
    record: &str,
    fields: &[String],
) -> bool {
    match column_indices {
        Some(indices) => indices
            .iter()
            .filter_map(|&i| fields.get(i))
            .any(|f| matcher.matches(f)),
        None => matcher.matches(record),
    }
}

fn resolve_payload_convention(header: &Header) -> usize {
    for convention in PAYLOAD_CONVENTIONS {
        if let Some(idx) = header.position(convention) {
            return idx;
        }
    }
    header.len().saturating_sub(1)
}
