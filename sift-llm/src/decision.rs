//! Turning raw planner text into a [`Decision`].
//!
//! The planner is asked to respond with a single JSON object
//! `{reasoning, action, params}` as the last content of its message, with
//! optional chain-of-thought inside recognized marker pairs. This module
//! strips the markers, extracts the last balanced JSON object, and
//! validates. Every failure path yields [`Decision::Invalid`].

use serde_json::{Map, Value};
use sift_core::decision::{Decision, FINALIZE_ACTION};

/// Recognized reasoning delimiter pairs, matched case-insensitively.
const REASONING_MARKERS: &[(&str, &str)] = &[
    ("<think>", "</think>"),
    ("<thinking>", "</thinking>"),
    ("<reasoning>", "</reasoning>"),
];

/// Remove content between recognized reasoning markers. An unterminated
/// opener swallows the rest of the text (the model was still thinking).
pub fn strip_reasoning(text: &str) -> String {
    let mut out = text.to_string();
    for (open, close) in REASONING_MARKERS {
        loop {
            let Some(start) = find_ascii_ci(&out, open, 0) else {
                break;
            };
            match find_ascii_ci(&out, close, start + open.len()) {
                Some(close_at) => {
                    out.replace_range(start..close_at + close.len(), "");
                }
                None => {
                    out.truncate(start);
                    break;
                }
            }
        }
    }
    out
}

/// ASCII-case-insensitive substring search starting at byte `from`. The
/// needle must be ASCII, so matches can only begin at character
/// boundaries.
fn find_ascii_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes().get(from..)?;
    let needle = needle.as_bytes();
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    hay.windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|pos| from + pos)
}

/// Extract the last balanced top-level JSON object from `text`,
/// respecting strings. Returns `None` when no complete object exists.
pub fn extract_last_json(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut last_span: Option<(usize, usize)> = None;
    let mut start = None;
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
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        last_span = Some((s, i + 1));
                    }
                }
            }
            _ => {}
        }
    }
    last_span.map(|(s, e)| &text[s..e])
}

/// Parse raw planner output into a [`Decision`].
pub fn parse_decision(raw: &str) -> Decision {
    let stripped = strip_reasoning(raw);
    let Some(json_text) = extract_last_json(&stripped) else {
        return Decision::Invalid {
            reason: "no JSON object in planner output".into(),
        };
    };

    let value: Value = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(e) => {
            return Decision::Invalid {
                reason: format!("planner JSON does not parse: {e}"),
            };
        }
    };
    let Some(obj) = value.as_object() else {
        return Decision::Invalid {
            reason: "planner output is not a JSON object".into(),
        };
    };

    let action = match obj.get("action").and_then(Value::as_str) {
        Some(a) if !a.trim().is_empty() => a.trim().to_string(),
        _ => {
            return Decision::Invalid {
                reason: "'action' is missing or empty".into(),
            };
        }
    };
    let reasoning = obj
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let params: Map<String, Value> = match obj.get("params") {
        Some(Value::Object(m)) => m.clone(),
        None | Some(Value::Null) => Map::new(),
        Some(_) => {
            return Decision::Invalid {
                reason: "'params' must be a mapping".into(),
            };
        }
    };

    if action == FINALIZE_ACTION {
        let answer = params
            .get("answer")
            .and_then(Value::as_str)
            .map(str::to_string);
        let Some(answer) = answer else {
            return Decision::Invalid {
                reason: "finalize_answer requires a string 'answer' parameter".into(),
            };
        };
        let confidence = params
            .get("confidence")
            .and_then(Value::as_f64)
            .filter(|c| (0.0..=1.0).contains(c));
        return Decision::Finalize {
            answer,
            confidence,
            reasoning,
        };
    }

    Decision::Invoke {
        tool: action,
        params,
        reasoning,
    }
}
