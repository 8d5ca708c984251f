//! Shared helpers for the tool set.

use std::collections::BTreeSet;

use sift_core::WorkingSet;
use sift_tool::ToolInput;

/// Standard message when a logs-consuming tool has no working set.
pub(crate) const NO_LOGS: &str =
    "no logs loaded — search the file first (grep_logs) so there is a working set to operate on";

/// Standard message when a values-consuming tool has no values.
pub(crate) const NO_VALUES: &str =
    "no values available — extract a field first (parse_json_field) so there is a list to work on";

/// Deduplicate preserving first occurrence.
pub(crate) fn dedup_first_occurrence(values: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for value in values {
        if seen.insert(value.as_str()) {
            out.push(value.clone());
        }
    }
    out
}

/// Heuristic for a common planner mistake: passing field *names* where
/// field *values* belong. A short list of PascalCase identifiers (like
/// `["CmMacAddress"]`) is almost certainly field names.
pub(crate) fn looks_like_field_names(values: &[String]) -> bool {
    if values.is_empty() || values.len() > 5 {
        return false;
    }
    values.iter().all(|v| {
        let mut chars = v.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        first.is_ascii_uppercase()
            && v.len() > 2
            && v.chars().all(|c| c.is_ascii_alphanumeric())
            && v.chars().any(|c| c.is_ascii_lowercase())
    })
}

/// Whether a planner-supplied value list is a placeholder sample rather
/// than real data: the literal `[".*"]` or a tiny stub.
pub(crate) fn is_placeholder_sample(values: &[String]) -> bool {
    if values.len() == 1 && values[0] == ".*" {
        return true;
    }
    values.len() <= 3
}

/// The value list this invocation should operate on: explicit parameters
/// win, the injected state list is the fallback. When the explicit list
/// is a placeholder sample and the injected list is larger, the injected
/// list is substituted (the planner echoed an example instead of data).
/// The second element is true when substitution happened.
pub(crate) fn effective_values(input: &ToolInput) -> Option<(Vec<String>, bool)> {
    let explicit = input.list_param("values");
    match (explicit, &input.values) {
        (Some(explicit), Some(injected))
            if is_placeholder_sample(&explicit) && injected.len() > explicit.len() =>
        {
            Some((injected.clone(), true))
        }
        (Some(explicit), _) if !explicit.is_empty() => Some((explicit, false)),
        (_, Some(injected)) if !injected.is_empty() => Some((injected.clone(), false)),
        _ => None,
    }
}

/// Distinct JSON field names observed across (up to) the first rows of a
/// working set. Used in "field not found" messages.
pub(crate) fn observed_fields(ws: &WorkingSet, row_cap: usize, field_cap: usize) -> Vec<String> {
    let mut seen = BTreeSet::new();
    for row in ws.rows().iter().take(row_cap) {
        let event = sift_core::ParsedEvent::from_payload(ws.payload(row));
        for key in event.fields.keys() {
            seen.insert(key.clone());
        }
        if seen.len() >= field_cap {
            break;
        }
    }
    seen.into_iter().take(field_cap).collect()
}

/// Character-bounded truncation with an ellipsis.
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}\u{2026}")
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the tool tests.

    use std::io::Write;
    use std::sync::Arc;

    use serde_json::{Map, Value};
    use sift_core::{Header, LogRow, WorkingSet};
    use sift_store::{LogStore, StoreOptions};
    use tempfile::NamedTempFile;

    /// A temp CSV with header `Time,Host,Message` and the given rows,
    /// opened as a store.
    pub(crate) fn store_with(lines: &[&str]) -> (NamedTempFile, Arc<LogStore>) {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Time,Host,Message").unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        let store = Arc::new(LogStore::open(file.path(), StoreOptions::default()).unwrap());
        (file, store)
    }

    /// A parameter map from key/value pairs.
    pub(crate) fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// An in-memory working set whose single column is the payload.
    pub(crate) fn working_set(payloads: &[&str]) -> Arc<WorkingSet> {
        let header = Arc::new(Header::new(vec!["Message".into()]));
        let rows = payloads
            .iter()
            .enumerate()
            .map(|(i, p)| LogRow {
                line_number: i as u64 + 1,
                fields: vec![p.to_string()],
            })
            .collect();
        Arc::new(WorkingSet::new(header, 0, rows))
    }
}
