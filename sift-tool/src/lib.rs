#![deny(missing_docs)]
//! Tool interface and registry for sift.
//!
//! Defines the object-safe [`Tool`] trait, typed parameter declarations
//! ([`ParamSpec`]/[`ParamKind`]), the [`ToolInput`] carrying auto-injected
//! state, and [`ToolRegistry`] for lookup, validation, and the two
//! catalog renderings used in prompts.
//!
//! Expected failures (a field that does not exist, zero results) are
//! returned as `ToolResult { ok: false, .. }` by the tools themselves.
//! [`ToolError`] covers registry-level faults only: unknown tool names and
//! parameter values of the wrong shape.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};
use sift_core::{ToolResult, WorkingSet};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from registry-level tool handling.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found in the registry.
    #[error("tool not found: '{name}'; available: {available}")]
    NotFound {
        /// The requested name.
        name: String,
        /// Comma-separated registered tool names.
        available: String,
    },

    /// A parameter was missing or had the wrong shape.
    #[error("invalid input for '{tool}': {message}")]
    InvalidInput {
        /// The tool being invoked.
        tool: String,
        /// What was wrong, with next-step hints.
        message: String,
    },

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Type tag for a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A string value.
    String,
    /// An integer value (numeric strings are coerced).
    Int,
    /// A boolean value (`"true"`/`"false"` strings are coerced).
    Bool,
    /// A list of strings (a lone string becomes a one-element list).
    StringList,
    /// A tabular working set; supplied by injection, not by the planner.
    Table,
    /// Anything.
    Any,
}

impl ParamKind {
    /// Label used in catalogs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Int => "int",
            ParamKind::Bool => "bool",
            ParamKind::StringList => "list",
            ParamKind::Table => "table",
            ParamKind::Any => "any",
        }
    }

    /// Coerce a planner-supplied value into this kind's canonical JSON
    /// shape. Planner models routinely quote numbers and booleans, so
    /// numeric and boolean strings are accepted.
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        match self {
            ParamKind::Any | ParamKind::Table => Ok(value.clone()),
            ParamKind::String => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(format!("expected a string, got {}", type_name(value))),
            },
            ParamKind::Int => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| format!("expected an integer, got '{s}'")),
                _ => Err(format!("expected an integer, got {}", type_name(value))),
            },
            ParamKind::Bool => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" => Ok(Value::Bool(true)),
                    "false" | "no" => Ok(Value::Bool(false)),
                    _ => Err(format!("expected a boolean, got '{s}'")),
                },
                _ => Err(format!("expected a boolean, got {}", type_name(value))),
            },
            ParamKind::StringList => match value {
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::String(s) => out.push(Value::String(s.clone())),
                            Value::Number(n) => out.push(Value::String(n.to_string())),
                            other => {
                                return Err(format!(
                                    "expected a list of strings, found {}",
                                    type_name(other)
                                ));
                            }
                        }
                    }
                    Ok(Value::Array(out))
                }
                Value::String(s) => Ok(Value::Array(vec![Value::String(s.clone())])),
                _ => Err(format!(
                    "expected a list of strings, got {}",
                    type_name(value)
                )),
            },
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Declaration of one tool parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: &'static str,
    /// Type tag.
    pub kind: ParamKind,
    /// Whether the planner must supply it.
    pub required: bool,
    /// Default filled in when absent.
    pub default: Option<Value>,
    /// One-line description for the detailed catalog.
    pub description: &'static str,
}

impl ParamSpec {
    /// A required parameter.
    pub fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            description,
        }
    }

    /// An optional parameter without a default.
    pub fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            description,
        }
    }

    /// An optional parameter with a default value.
    pub fn with_default(
        name: &'static str,
        kind: ParamKind,
        default: Value,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default),
            description,
        }
    }
}

/// Everything a tool invocation receives: validated parameters plus the
/// state the orchestrator injected.
#[derive(Debug, Clone)]
pub struct ToolInput {
    /// Validated, default-filled parameters.
    pub params: Map<String, Value>,
    /// The current working set, injected when the tool declares `logs`.
    pub logs: Option<Arc<WorkingSet>>,
    /// The last value list, injected when the tool declares `values`.
    pub values: Option<Vec<String>>,
    /// Which field the injected values were extracted from, when known.
    /// Lets dedup/count tools keep the per-field extraction record honest.
    pub values_field: Option<String>,
    /// The original user query, for query-aware tools.
    pub query: String,
    /// Per-query cancellation token.
    pub cancel: CancellationToken,
}

impl ToolInput {
    /// An input with just parameters (used in tests and composition).
    pub fn from_params(params: Map<String, Value>) -> Self {
        Self {
            params,
            logs: None,
            values: None,
            values_field: None,
            query: String::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// A string parameter.
    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// A boolean parameter.
    pub fn bool_param(&self, name: &str) -> Option<bool> {
        self.params.get(name).and_then(Value::as_bool)
    }

    /// An integer parameter.
    pub fn int_param(&self, name: &str) -> Option<i64> {
        self.params.get(name).and_then(Value::as_i64)
    }

    /// A non-negative integer parameter.
    pub fn usize_param(&self, name: &str) -> Option<usize> {
        self.int_param(name).and_then(|n| usize::try_from(n).ok())
    }

    /// A string-list parameter.
    pub fn list_param(&self, name: &str) -> Option<Vec<String>> {
        let items = self.params.get(name)?.as_array()?;
        Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )
    }
}

/// Object-safe trait for tool implementations.
///
/// `execute` returns a [`ToolResult`] directly: expected failure modes are
/// `ok = false` results with a message the planner can act on, never
/// panics or errors.
pub trait Tool: Send + Sync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// One-line description for the compact catalog.
    fn description(&self) -> &str;

    /// Ordered parameter declarations.
    fn parameters(&self) -> Vec<ParamSpec>;

    /// Whether the tool consumes the current working set. The
    /// orchestrator injects `ToolInput::logs` for such tools when the
    /// planner did not supply tabular input.
    fn requires_logs(&self) -> bool {
        false
    }

    /// Execute the tool.
    fn execute(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>>;
}

/// Registry of tools, iterated in registration order.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. Overwrites any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&idx) => self.tools[idx] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&idx| &self.tools[idx])
    }

    /// Iterate over tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Validate planner-supplied parameters for `name`, fill defaults,
    /// and return the normalized parameter map.
    ///
    /// Unknown extra parameters are dropped with a debug note rather than
    /// rejected — planner models embellish.
    pub fn prepare(
        &self,
        name: &str,
        params: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
            available: self.names().join(", "),
        })?;

        let specs = tool.parameters();
        let mut out = Map::new();
        for spec in &specs {
            match params.get(spec.name) {
                Some(Value::Null) | None => {
                    if let Some(default) = &spec.default {
                        out.insert(spec.name.to_string(), default.clone());
                    } else if spec.required {
                        return Err(ToolError::InvalidInput {
                            tool: name.to_string(),
                            message: format!(
                                "missing required parameter '{}' ({})",
                                spec.name,
                                spec.kind.label()
                            ),
                        });
                    }
                }
                Some(value) => {
                    let coerced =
                        spec.kind
                            .coerce(value)
                            .map_err(|message| ToolError::InvalidInput {
                                tool: name.to_string(),
                                message: format!("parameter '{}': {message}", spec.name),
                            })?;
                    out.insert(spec.name.to_string(), coerced);
                }
            }
        }

        for key in params.keys() {
            if !specs.iter().any(|s| s.name == key) {
                tracing::debug!(tool = name, param = %key, "dropping unknown parameter");
            }
        }

        Ok(out)
    }

    /// Compact catalog: one line per tool, for the system prompt.
    pub fn catalog_compact(&self) -> String {
        let mut out = String::new();
        for tool in &self.tools {
            out.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
        }
        out
    }

    /// Detailed catalog: full signatures with parameter types, required
    /// flags, and defaults.
    pub fn catalog_detailed(&self) -> String {
        let mut out = String::new();
        for tool in &self.tools {
            let params = tool
                .parameters()
                .iter()
                .map(|p| {
                    let mut s = format!("{}: {}", p.name, p.kind.label());
                    if !p.required {
                        s = format!("{s}?");
                    }
                    if let Some(default) = &p.default {
                        s = format!("{s} = {default}");
                    }
                    s
                })
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(
                "{}({})\n  {}\n",
                tool.name(),
                params,
                tool.description()
            ));
        }
        out
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sift_core::{DataKind, ToolData};

    struct EchoTool;

    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes its pattern back"
        }
        fn parameters(&self) -> Vec<ParamSpec> {
            vec![
                ParamSpec::required("pattern", ParamKind::String, "text to echo"),
                ParamSpec::with_default(
                    "times",
                    ParamKind::Int,
                    json!(1),
                    "how many times",
                ),
                ParamSpec::optional("loud", ParamKind::Bool, "shout it"),
            ]
        }
        fn execute(
            &self,
            input: ToolInput,
        ) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
            Box::pin(async move {
                let pattern = input.str_param("pattern").unwrap_or("").to_string();
                ToolResult::ok(pattern.clone(), ToolData::Text(pattern), DataKind::Formatted)
            })
        }
    }

    fn registry() -> ToolRegistry {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        reg
    }

    #[test]
    fn register_get_and_order() {
        let reg = registry();
        assert_eq!(reg.len(), 1);
        assert!(reg.get("echo").is_some());
        assert!(reg.get("nope").is_none());
        assert_eq!(reg.names(), ["echo"]);
    }

    #[test]
    fn register_overwrites_same_name() {
        let mut reg = registry();
        reg.register(Arc::new(EchoTool));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn prepare_fills_defaults() {
        let reg = registry();
        let mut params = Map::new();
        params.insert("pattern".into(), json!("hello"));
        let prepared = reg.prepare("echo", &params).unwrap();
        assert_eq!(prepared["pattern"], json!("hello"));
        assert_eq!(prepared["times"], json!(1));
        assert!(!prepared.contains_key("loud"));
    }

    #[test]
    fn prepare_missing_required_fails_with_hint() {
        let reg = registry();
        let err = reg.prepare("echo", &Map::new()).unwrap_err();
        match err {
            ToolError::InvalidInput { message, .. } => {
                assert!(message.contains("pattern"));
                assert!(message.contains("string"));
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn prepare_unknown_tool_lists_available() {
        let reg = registry();
        let err = reg.prepare("bogus", &Map::new()).unwrap_err();
        match err {
            ToolError::NotFound { available, .. } => assert!(available.contains("echo")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn prepare_coerces_planner_strings() {
        let reg = registry();
        let mut params = Map::new();
        params.insert("pattern".into(), json!(42));
        params.insert("times".into(), json!("3"));
        params.insert("loud".into(), json!("true"));
        let prepared = reg.prepare("echo", &params).unwrap();
        assert_eq!(prepared["pattern"], json!("42"));
        assert_eq!(prepared["times"], json!(3));
        assert_eq!(prepared["loud"], json!(true));
    }

    #[test]
    fn prepare_rejects_wrong_shapes() {
        let reg = registry();
        let mut params = Map::new();
        params.insert("pattern".into(), json!("x"));
        params.insert("times".into(), json!("not a number"));
        assert!(reg.prepare("echo", &params).is_err());
    }

    #[test]
    fn prepare_drops_unknown_params() {
        let reg = registry();
        let mut params = Map::new();
        params.insert("pattern".into(), json!("x"));
        params.insert("made_up".into(), json!("y"));
        let prepared = reg.prepare("echo", &params).unwrap();
        assert!(!prepared.contains_key("made_up"));
    }

    #[test]
    fn string_list_coercion() {
        assert_eq!(
            ParamKind::StringList.coerce(&json!("solo")).unwrap(),
            json!(["solo"])
        );
        assert_eq!(
            ParamKind::StringList.coerce(&json!(["a", 2])).unwrap(),
            json!(["a", "2"])
        );
        assert!(ParamKind::StringList.coerce(&json!({"a": 1})).is_err());
    }

    #[test]
    fn catalogs_render() {
        let reg = registry();
        let compact = reg.catalog_compact();
        assert!(compact.contains("- echo: Echoes its pattern back"));
        let detailed = reg.catalog_detailed();
        assert!(detailed.contains("echo(pattern: string, times: int? = 1, loud: bool?)"));
    }

    #[tokio::test]
    async fn execute_through_registry() {
        let reg = registry();
        let mut params = Map::new();
        params.insert("pattern".into(), json!("hi"));
        let prepared = reg.prepare("echo", &params).unwrap();
        let tool = reg.get("echo").unwrap();
        let result = tool.execute(ToolInput::from_params(prepared)).await;
        assert!(result.ok);
        assert_eq!(result.message, "hi");
    }
}
