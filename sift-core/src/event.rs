//! Best-effort decoding of a log payload into a structured event.
//!
//! A payload conventionally looks like
//! `<ISO-8601 timestamp> <opaque tokens> <JSON object>`, but nothing is
//! guaranteed. Decoding never fails: anything that cannot be extracted is
//! simply absent. Embedded JSON with one layer of doubled quotes
//! (`""key"": ""value""`) decodes to the same fields as its clean form.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Conventional severity hierarchy, `Debug < Info < Warn < Error`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Diagnostic chatter.
    Debug,
    /// Normal operation.
    Info,
    /// Something suspicious but survivable.
    Warn,
    /// Something failed.
    Error,
}

impl Severity {
    /// All severities in ascending order.
    pub const ALL: [Severity; 4] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
    ];

    /// Upper-case label for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    /// Parse a severity word, accepting the conventional synonyms.
    /// Returns `None` for anything unrecognized.
    pub fn parse(word: &str) -> Option<Severity> {
        match word.trim().to_ascii_uppercase().as_str() {
            "DEBUG" | "DBG" | "TRACE" => Some(Severity::Debug),
            "INFO" => Some(Severity::Info),
            "WARN" | "WARNING" => Some(Severity::Warn),
            "ERROR" | "ERR" | "FATAL" | "CRITICAL" => Some(Severity::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of best-effort payload decoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedEvent {
    /// Leading timestamp, when one parsed.
    pub timestamp: Option<DateTime<FixedOffset>>,
    /// Severity, from the embedded JSON or the leading tokens.
    pub severity: Option<Severity>,
    /// Free-form message (the JSON `message` field, else the non-JSON
    /// prefix after the timestamp).
    pub message: String,
    /// Named fields from the embedded JSON, flattened to strings.
    /// First occurrence of a field name wins.
    pub fields: HashMap<String, String>,
}

impl ParsedEvent {
    /// Decode a payload. Never fails; missing pieces stay absent.
    pub fn from_payload(payload: &str) -> ParsedEvent {
        let trimmed = payload.trim();
        let (timestamp, rest) = parse_leading_timestamp(trimmed);

        let mut fields = HashMap::new();
        let mut json_start = None;
        if let Some((value, start)) = decode_embedded_json(rest) {
            flatten_into(&value, &mut fields);
            json_start = Some(start);
        }

        let prefix = match json_start {
            Some(start) => rest[..start].trim(),
            None => rest,
        };

        let severity = fields
            .get("severity")
            .or_else(|| fields.get("level"))
            .or_else(|| fields.get("loglevel"))
            .and_then(|v| Severity::parse(v))
            .or_else(|| {
                prefix
                    .split_whitespace()
                    .find_map(|tok| Severity::parse(tok.trim_matches(|c: char| !c.is_ascii_alphanumeric())))
            });

        let message = fields
            .get("message")
            .or_else(|| fields.get("msg"))
            .cloned()
            .unwrap_or_else(|| prefix.to_string());

        ParsedEvent {
            timestamp,
            severity,
            message,
            fields,
        }
    }

    /// Look up a field by name, case-insensitively. Returns the canonical
    /// field name and its value.
    pub fn field_ci<'a>(&'a self, name: &'a str) -> Option<(&'a str, &'a str)> {
        if let Some(v) = self.fields.get(name) {
            return Some((name, v.as_str()));
        }
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse an ISO-8601-ish timestamp at the start of `text`. Returns the
/// timestamp (if any) and the remainder of the text.
pub fn parse_leading_timestamp(text: &str) -> (Option<DateTime<FixedOffset>>, &str) {
    let mut tokens = text.splitn(3, char::is_whitespace);
    let first = match tokens.next() {
        Some(t) if !t.is_empty() => t,
        _ => return (None, text),
    };

    if first.contains('T') {
        if let Ok(ts) = DateTime::parse_from_rfc3339(first) {
            return (Some(ts), text[first.len()..].trim_start());
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(first, "%Y-%m-%dT%H:%M:%S%.f") {
            return (
                Some(naive.and_utc().fixed_offset()),
                text[first.len()..].trim_start(),
            );
        }
        return (None, text);
    }

    // Space-separated date and time: consume two tokens.
    if let Some(second) = tokens.next() {
        let candidate_len = first.len() + 1 + second.len();
        if let Some(rest) = text.get(candidate_len..) {
            let joined = format!("{first} {second}");
            if let Ok(naive) = NaiveDateTime::parse_from_str(&joined, "%Y-%m-%d %H:%M:%S%.f") {
                return (Some(naive.and_utc().fixed_offset()), rest.trim_start());
            }
        }
    }
    (None, text)
}

/// Collapse one layer of doubled quotes (`""` → `"`).
pub fn unescape_quotes_once(text: &str) -> String {
    text.replace("\"\"", "\"")
}

/// Find and decode the embedded JSON object in `text`. Returns the decoded
/// value and the byte offset where the object starts. Tolerates one layer
/// of doubled-quote escaping, and skips stray braces in the message prefix.
pub fn decode_embedded_json(text: &str) -> Option<(serde_json::Value, usize)> {
    let mut offset = 0usize;
    // A handful of attempts covers stray braces without rescanning forever.
    for _ in 0..8 {
        let start = offset + text[offset..].find('{')?;
        let raw = &text[start..];

        if let Some(candidate) = balanced_object(raw) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
                if value.is_object() {
                    return Some((value, start));
                }
            }
        }

        // One layer of "" escaping: unescape and retry.
        let unescaped = unescape_quotes_once(raw);
        if let Some(candidate) = balanced_object(&unescaped) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
                if value.is_object() {
                    return Some((value, start));
                }
            }
        }
        offset = start + 1;
    }
    None
}

/// The longest balanced `{…}` prefix of `text`, respecting JSON strings.
fn balanced_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    debug_assert!(bytes.first() == Some(&b'{'));
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Flatten a JSON value into string fields. Nested objects contribute
/// their leaf keys; arrays of scalars join with `,`. First occurrence of
/// a key wins.
fn flatten_into(value: &serde_json::Value, out: &mut HashMap<String, String>) {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => return,
    };
    for (key, val) in obj {
        match val {
            serde_json::Value::Object(_) => flatten_into(val, out),
            serde_json::Value::Array(items) => {
                let joined = items
                    .iter()
                    .filter_map(scalar_to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                if !joined.is_empty() {
                    out.entry(key.clone()).or_insert(joined);
                }
            }
            _ => {
                if let Some(s) = scalar_to_string(val) {
                    out.entry(key.clone()).or_insert(s);
                }
            }
        }
    }
}

fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
