//! Relationship walking: `find_relationship_chain` and
//! `count_via_relationship`.
//!
//! The walker is a bounded breadth-first search over the value graph the
//! log file implies: grep a value, parse every JSON field of the matching
//! rows, and pivot on the discovered `(field, value)` pairs until the
//! target field shows up. A global visited set keyed by `(field, value)`
//! breaks cycles, and a grep budget caps total work regardless of graph
//! shape.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::json;
use sift_catalog::EntityCatalog;
use sift_core::{ChainHop, ChainOutcome, DataKind, ParsedEvent, ToolData, ToolResult};
use sift_store::{LogStore, SearchQuery, StoreError};
use sift_tool::{ParamKind, ParamSpec, Tool, ToolInput};
use tokio_util::sync::CancellationToken;

use crate::parse::extract_field_values;
use crate::util::dedup_first_occurrence;

/// Bounds for one walker invocation.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Maximum grep levels (1 = direct co-occurrence only). Clamped to 1–5.
    pub max_depth: usize,
    /// Maximum total grep calls per invocation.
    pub grep_budget: usize,
    /// Match cap per grep.
    pub per_grep_limit: usize,
    /// Cap on the global visited set.
    pub visited_cap: usize,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            grep_budget: 24,
            per_grep_limit: 200,
            visited_cap: 500,
        }
    }
}

struct WalkOutcome {
    chain: ChainOutcome,
    start_rows: usize,
    greps_used: usize,
}

struct Walker<'a> {
    store: &'a LogStore,
    catalog: &'a EntityCatalog,
    config: &'a WalkerConfig,
    cancel: &'a CancellationToken,
    greps_used: usize,
}

#[derive(Debug)]
struct Node {
    value: String,
    path: Vec<ChainHop>,
}

impl<'a> Walker<'a> {
    fn new(
        store: &'a LogStore,
        catalog: &'a EntityCatalog,
        config: &'a WalkerConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            store,
            catalog,
            config,
            cancel,
            greps_used: 0,
        }
    }

    /// Grep `value` and return the distinct `(field, value)` pairs of the
    /// matching rows in encounter order, plus the matched row count.
    /// `None` once the grep budget is spent.
    fn grep_pairs(
        &mut self,
        value: &str,
    ) -> Result<Option<(Vec<(String, String)>, usize)>, StoreError> {
        if self.greps_used >= self.config.grep_budget {
            return Ok(None);
        }
        self.greps_used += 1;
        let query = SearchQuery::new(value)
            .case_sensitive(true)
            .max_matches(self.config.per_grep_limit);
        let outcome = self.store.search(&query, self.cancel)?;

        let ws = &outcome.working_set;
        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        for row in ws.rows() {
            let event = ParsedEvent::from_payload(ws.payload(row));
            for (field, val) in &event.fields {
                if val.is_empty() {
                    continue;
                }
                if seen.insert((field.to_lowercase(), val.clone())) {
                    pairs.push((field.clone(), val.clone()));
                }
            }
        }
        Ok(Some((pairs, ws.len())))
    }

    fn walk(&mut self, start_value: &str, target_field: &str) -> Result<WalkOutcome, StoreError> {
        let max_depth = self.config.max_depth.clamp(1, 5);
        let mut visited: HashSet<(String, String)> = HashSet::new();
        visited.insert((String::new(), start_value.to_string()));

        let mut queue: VecDeque<Node> = VecDeque::new();
        queue.push_back(Node {
            value: start_value.to_string(),
            path: Vec::new(),
        });

        let mut best: Option<ChainOutcome> = None;
        let mut start_rows = 0usize;
        let mut deepest = 0usize;

        while let Some(node) = queue.pop_front() {
            // BFS order: once a chain is found, only same-length paths can
            // still compete on the tie-break.
            if let Some(found) = &best {
                if node.path.len() + 1 > found.depth {
                    break;
                }
            }
            let Some((pairs, rows)) = self.grep_pairs(&node.value)? else {
                break; // grep budget exhausted
            };
            if node.path.is_empty() {
                start_rows = rows;
            }
            deepest = deepest.max(node.path.len() + 1);

            let targets: Vec<String> = {
                let raw: Vec<String> = pairs
                    .iter()
                    .filter(|(field, _)| field.eq_ignore_ascii_case(target_field))
                    .map(|(_, value)| value.clone())
                    .collect();
                dedup_first_occurrence(&raw)
            };
            if !targets.is_empty() {
                let candidate = ChainOutcome {
                    path: node.path.clone(),
                    targets,
                    depth: node.path.len() + 1,
                    found: true,
                };
                best = Some(match best.take() {
                    None => candidate,
                    Some(current) => pick_better(current, candidate),
                });
                continue;
            }

            // A child found at the next level would have depth
            // `node.path.len() + 2`; do not expand past the depth bound.
            if node.path.len() + 2 > max_depth {
                continue;
            }

            let mut children: Vec<(String, String)> = pairs
                .into_iter()
                .filter(|(field, value)| {
                    value != &node.value
                        && value != start_value
                        && !visited.contains(&(field.to_lowercase(), value.clone()))
                })
                .collect();
            let neighbor_count = children.len();

            // Relationship ordering: fields whose kind neighbors the kind
            // we arrived by are explored first; ties resolve lexically.
            let parent_related: Vec<String> = node
                .path
                .last()
                .and_then(|hop| self.catalog.kind_of_field(&hop.field))
                .map(|kind| kind.related.clone())
                .unwrap_or_default();
            children.sort_by(|a, b| {
                let rank = |(field, _value): &(String, String)| {
                    let related = self
                        .catalog
                        .kind_of_field(field)
                        .is_some_and(|kind| parent_related.contains(&kind.name));
                    if related { 0u8 } else { 1u8 }
                };
                rank(a)
                    .cmp(&rank(b))
                    .then_with(|| a.0.to_lowercase().cmp(&b.0.to_lowercase()))
                    .then_with(|| a.1.cmp(&b.1))
            });

            for (field, value) in children {
                if visited.len() >= self.config.visited_cap {
                    break;
                }
                visited.insert((field.to_lowercase(), value.clone()));
                let mut path = node.path.clone();
                path.push(ChainHop {
                    field,
                    value: value.clone(),
                    neighbor_count,
                });
                queue.push_back(Node { value, path });
            }
        }

        let chain = best.unwrap_or(ChainOutcome {
            path: Vec::new(),
            targets: Vec::new(),
            depth: deepest,
            found: false,
        });
        Ok(WalkOutcome {
            chain,
            start_rows,
            greps_used: self.greps_used,
        })
    }
}

/// Tie-break between equal-depth chains: at the earliest hop where the
/// neighbor counts differ, the higher count wins; fully equal chains keep
/// the first one found.
fn pick_better(current: ChainOutcome, candidate: ChainOutcome) -> ChainOutcome {
    if candidate.depth != current.depth {
        return if candidate.depth < current.depth {
            candidate
        } else {
            current
        };
    }
    for (a, b) in current.path.iter().zip(candidate.path.iter()) {
        if a.neighbor_count != b.neighbor_count {
            return if b.neighbor_count > a.neighbor_count {
                candidate
            } else {
                current
            };
        }
    }
    current
}

fn describe_path(chain: &ChainOutcome, start_value: &str) -> String {
    let mut parts = vec![start_value.to_string()];
    for hop in &chain.path {
        parts.push(format!("{}={}", hop.field, hop.value));
    }
    parts.join(" -> ")
}

/// Bounded BFS from a start value to a target field.
pub struct RelationshipChainTool {
    store: Arc<LogStore>,
    catalog: Arc<EntityCatalog>,
    config: WalkerConfig,
}

impl RelationshipChainTool {
    /// A chain tool with default walker bounds.
    pub fn new(store: Arc<LogStore>, catalog: Arc<EntityCatalog>) -> Self {
        Self {
            store,
            catalog,
            config: WalkerConfig::default(),
        }
    }

    /// Override the walker bounds.
    #[must_use]
    pub fn with_config(mut self, config: WalkerConfig) -> Self {
        self.config = config;
        self
    }
}

impl Tool for RelationshipChainTool {
    fn name(&self) -> &str {
        "find_relationship_chain"
    }

    fn description(&self) -> &str {
        "Follow value-to-value links across rows from a start value until a target field is found"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required(
                "start_value",
                ParamKind::String,
                "the known value to start from",
            ),
            ParamSpec::required(
                "target_field",
                ParamKind::String,
                "the field whose value is wanted",
            ),
            ParamSpec::with_default(
                "max_depth",
                ParamKind::Int,
                json!(4),
                "maximum link-following depth (1-5)",
            ),
        ]
    }

    fn execute(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let start_value = input.str_param("start_value").unwrap_or_default().to_string();
            let target_field = input
                .str_param("target_field")
                .unwrap_or_default()
                .to_string();
            let mut config = self.config.clone();
            if let Some(depth) = input.usize_param("max_depth") {
                config.max_depth = depth.clamp(1, 5);
            }
            let depth_bound = config.max_depth.clamp(1, 5);

            let store = Arc::clone(&self.store);
            let catalog = Arc::clone(&self.catalog);
            let cancel = input.cancel.clone();
            let start = start_value.clone();
            let target = target_field.clone();
            let walked = tokio::task::spawn_blocking(move || {
                Walker::new(&store, &catalog, &config, &cancel).walk(&start, &target)
            })
            .await;

            let outcome = match walked {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(StoreError::Cancelled)) => return ToolResult::fail("walk cancelled"),
                Ok(Err(err)) => return ToolResult::fail(format!("walk failed: {err}")),
                Err(join) => return ToolResult::fail(format!("walk task failed: {join}")),
            };

            if outcome.start_rows == 0 {
                return ToolResult::fail(format!(
                    "start value '{start_value}' does not appear in the log file"
                ));
            }

            let chain = outcome.chain;
            if chain.found {
                let message = format!(
                    "Found {target_field} = [{}] at depth {} via {} ({} searches used)",
                    chain.targets.join(", "),
                    chain.depth,
                    describe_path(&chain, &start_value),
                    outcome.greps_used
                );
                ToolResult::ok(message, ToolData::Chain(chain), DataKind::Aggregated)
            } else {
                let message = format!(
                    "Did not reach {target_field} from '{start_value}' within depth \
                     {depth_bound} and {} searches; partial exploration reached depth {}",
                    outcome.greps_used, chain.depth
                );
                ToolResult::ok(message, ToolData::Chain(chain), DataKind::Aggregated)
            }
        })
    }
}

/// For every distinct source-field value, walk to the target field and
/// aggregate how many sources map to each target value.
pub struct RelationshipCountTool {
    store: Arc<LogStore>,
    catalog: Arc<EntityCatalog>,
}

/// Cap on how many distinct sources one invocation walks.
const SOURCE_CAP: usize = 25;

impl RelationshipCountTool {
    /// A relationship-count tool over the shared services.
    pub fn new(store: Arc<LogStore>, catalog: Arc<EntityCatalog>) -> Self {
        Self { store, catalog }
    }
}

impl Tool for RelationshipCountTool {
    fn name(&self) -> &str {
        "count_via_relationship"
    }

    fn description(&self) -> &str {
        "Count how many source-field values map to each target-field value via relationship walks"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required(
                "source_field",
                ParamKind::String,
                "field whose distinct values are the sources",
            ),
            ParamSpec::required(
                "target_field",
                ParamKind::String,
                "field to resolve each source to",
            ),
            ParamSpec::with_default(
                "max_depth",
                ParamKind::Int,
                json!(2),
                "maximum link-following depth per source (1-5)",
            ),
            ParamSpec::with_default("top_n", ParamKind::Int, json!(10), "groups to keep"),
        ]
    }

    fn execute(&self, input: ToolInput) -> Pin<Box<dyn Future<Output = ToolResult> + Send + '_>> {
        Box::pin(async move {
            let source_field = input
                .str_param("source_field")
                .unwrap_or_default()
                .to_string();
            let target_field = input
                .str_param("target_field")
                .unwrap_or_default()
                .to_string();
            let max_depth = input.usize_param("max_depth").unwrap_or(2).clamp(1, 5);
            let top_n = input.usize_param("top_n").unwrap_or(10).max(1);

            let store = Arc::clone(&self.store);
            let catalog = Arc::clone(&self.catalog);
            let cancel = input.cancel.clone();
            let src = source_field.clone();
            let tgt = target_field.clone();

            let computed = tokio::task::spawn_blocking(move || {
                count_via_relationship(&store, &catalog, &src, &tgt, max_depth, &cancel)
            })
            .await;

            let (counts, mapped, total, truncated_sources) = match computed {
                Ok(Ok(v)) => v,
                Ok(Err(StoreError::Cancelled)) => return ToolResult::fail("walk cancelled"),
                Ok(Err(err)) => return ToolResult::fail(format!("walk failed: {err}")),
                Err(join) => return ToolResult::fail(format!("walk task failed: {join}")),
            };

            if total == 0 {
                return ToolResult::fail(format!(
                    "no '{source_field}' values found in the log file — check the field name"
                ));
            }

            let mut counts = counts;
            counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            counts.truncate(top_n);

            let mut message = format!(
                "Mapped {mapped}/{total} {source_field} values to {target_field} \
                 ({} target groups)",
                counts.len()
            );
            if truncated_sources {
                message.push_str(&format!("; sources were capped at {SOURCE_CAP}"));
            }
            ToolResult::ok(message, ToolData::Counts(counts), DataKind::Aggregated)
        })
    }
}

type RelationshipCounts = (Vec<(String, u64)>, usize, usize, bool);

fn count_via_relationship(
    store: &LogStore,
    catalog: &EntityCatalog,
    source_field: &str,
    target_field: &str,
    max_depth: usize,
    cancel: &CancellationToken,
) -> Result<RelationshipCounts, StoreError> {
    // Discover the sources: grep the field name itself and parse it out.
    let discovery = SearchQuery::new(source_field).max_matches(400);
    let outcome = store.search(&discovery, cancel)?;
    let (raw_values, _) = extract_field_values(&outcome.working_set, source_field);
    let sources = dedup_first_occurrence(&raw_values);
    let total = sources.len();
    let truncated = total > SOURCE_CAP;

    let per_source = WalkerConfig {
        max_depth,
        grep_budget: 6,
        per_grep_limit: 100,
        visited_cap: 100,
    };

    let mut counts: Vec<(String, u64)> = Vec::new();
    let mut mapped = 0usize;
    for source in sources.iter().take(SOURCE_CAP) {
        let walked = Walker::new(store, catalog, &per_source, cancel).walk(source, target_field)?;
        if walked.chain.found {
            mapped += 1;
            for target in &walked.chain.targets {
                match counts.iter_mut().find(|(t, _)| t == target) {
                    Some(entry) => entry.1 += 1,
                    None => counts.push((target.clone(), 1)),
                }
            }
        }
    }
    Ok((counts, mapped, total, truncated))
}
