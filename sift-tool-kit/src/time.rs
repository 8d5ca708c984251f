//! Temporal tools: `sort_by_time` and `extract_time_range`.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use sift_core::event::parse_leading_timestamp;
use sift_core::{DataKind, ToolData, ToolResult};
use sift_tool::{ParamKind, ParamSpec, Tool, ToolInput};
use std::sync::Arc;

use crate::util::NO_LOGS;

/// Sort the working set by payload timestamp; rows without a parseable
/// timestamp keep their relative order at the end.
pub struct SortByTimeTool;

impl Tool for SortByTimeTool {
    fn name(&self) -> &str {
        "sort_by_time"
    }

    fn description(&self) -> &str {
        "Sort the working set by timestamp, oldest first; rows without timestamps go last"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![]
    }

    fn requires_logs(&self) -> bool {
        true
    }

    fn execute(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let Some(ws) = input.logs.clone() else {
                return ToolResult::fail(NO_LOGS);
            };

            let mut keyed: Vec<(Option<DateTime<FixedOffset>>, usize)> = ws
                .rows()
                .iter()
                .enumerate()
                .map(|(idx, row)| (parse_leading_timestamp(ws.payload(row)).0, idx))
                .collect();
            let unparseable = keyed.iter().filter(|(ts, _)| ts.is_none()).count();
            // None sorts after every Some: stable sort keeps file order
            // among equal keys.
            keyed.sort_by(|a, b| match (a.0, b.0) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });

            let rows = keyed
                .into_iter()
                .map(|(_, idx)| ws.rows()[idx].clone())
                .collect();
            let sorted = ws.with_rows(rows);
            let message = if unparseable == 0 {
                format!("Sorted {} rows by time", sorted.len())
            } else {
                format!(
                    "Sorted {} rows by time ({unparseable} without parseable timestamps placed last)",
                    sorted.len()
                )
            };
            ToolResult::ok(message, ToolData::Table(Arc::new(sorted)), DataKind::RawLogs)
        })
    }
}

/// Keep only rows whose timestamp falls inside an inclusive range.
pub struct ExtractTimeRangeTool;

impl Tool for ExtractTimeRangeTool {
    fn name(&self) -> &str {
        "extract_time_range"
    }

    fn description(&self) -> &str {
        "Keep only rows inside a time range; accepts absolute times and now/now-Nh/now-Nm"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required(
                "start",
                ParamKind::String,
                "inclusive range start (ISO time, or now / now-Nh / now-Nm)",
            ),
            ParamSpec::required(
                "end",
                ParamKind::String,
                "inclusive range end (ISO time, or now / now-Nh / now-Nm)",
            ),
        ]
    }

    fn requires_logs(&self) -> bool {
        true
    }

    fn execute(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let Some(ws) = input.logs.clone() else {
                return ToolResult::fail(NO_LOGS);
            };
            let start_raw = input.str_param("start").unwrap_or_default();
            let end_raw = input.str_param("end").unwrap_or_default();

            let now = Utc::now().fixed_offset();
            let start = match parse_bound(start_raw, now) {
                Some(ts) => ts,
                None => return bound_error("start", start_raw),
            };
            let end = match parse_bound(end_raw, now) {
                Some(ts) => ts,
                None => return bound_error("end", end_raw),
            };
            if start > end {
                return ToolResult::fail(format!(
                    "range start {start_raw} is after range end {end_raw}"
                ));
            }

            let total = ws.len();
            let mut without_timestamp = 0usize;
            let rows: Vec<_> = ws
                .rows()
                .iter()
                .filter(|row| match parse_leading_timestamp(ws.payload(row)).0 {
                    Some(ts) => ts >= start && ts <= end,
                    None => {
                        without_timestamp += 1;
                        false
                    }
                })
                .cloned()
                .collect();

            let filtered = ws.with_rows(rows);
            let mut message = format!(
                "{} of {total} rows fall between {} and {}",
                filtered.len(),
                start.to_rfc3339(),
                end.to_rfc3339()
            );
            if without_timestamp > 0 {
                message.push_str(&format!(
                    " ({without_timestamp} rows without parseable timestamps excluded)"
                ));
            }
            ToolResult::ok(message, ToolData::Table(Arc::new(filtered)), DataKind::RawLogs)
        })
    }
}

fn bound_error(which: &str, raw: &str) -> ToolResult {
    ToolResult::fail(format!(
        "could not parse {which} time '{raw}'; use an ISO time like \
         2024-03-01T10:00:00Z, or now, now-2h, now-30m"
    ))
}

/// Parse an absolute or relative time bound.
fn parse_bound(raw: &str, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if let Some(relative) = parse_relative(trimmed, now) {
        return Some(relative);
    }
    let (ts, rest) = parse_leading_timestamp(trimmed);
    match ts {
        Some(ts) if rest.is_empty() => Some(ts),
        _ => None,
    }
}

fn parse_relative(raw: &str, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    if raw.eq_ignore_ascii_case("now") {
        return Some(now);
    }
    let rest = raw.strip_prefix("now-").or_else(|| raw.strip_prefix("NOW-"))?;
    let unit = rest.chars().last()?;
    let amount: i64 = rest[..rest.len() - 1].parse().ok()?;
    match unit.to_ascii_lowercase() {
        'h' => Some(now - Duration::hours(amount)),
        'm' => Some(now - Duration::minutes(amount)),
        _ => None,
    }
}
