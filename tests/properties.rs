//! Cross-crate laws that the unit tests cannot see in one place.

use std::io::Write;
use std::sync::Arc;

use sift_catalog::EntityCatalog;
use sift_context::SmartSummarizer;
use sift_store::{LogStore, SearchQuery, StoreOptions};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

fn corpus(rows: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Time,Host,Message").unwrap();
    for i in 0..rows {
        let severity = if i % 10 == 0 { "ERROR" } else { "INFO" };
        writeln!(
            file,
            r#"t{i},h,"2024-03-01T10:{:02}:00Z {severity} {{""CmMacAddress"": ""2c:00:00:00:00:{:02x}"", ""n"": {i}}}""#,
            i % 60,
            i % 9,
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

// Streaming search is a pure function of the file and the query: two runs
// agree row for row.
#[test]
fn search_is_deterministic() {
    let file = corpus(500);
    let store = LogStore::open(file.path(), StoreOptions::default()).unwrap();
    let query = SearchQuery::new("ERROR");
    let a = store.search(&query, &CancellationToken::new()).unwrap();
    let b = store.search(&query, &CancellationToken::new()).unwrap();
    assert_eq!(a.lines_scanned, b.lines_scanned);
    assert_eq!(a.working_set.len(), b.working_set.len());
    let lines_a: Vec<u64> = a.working_set.rows().iter().map(|r| r.line_number).collect();
    let lines_b: Vec<u64> = b.working_set.rows().iter().map(|r| r.line_number).collect();
    assert_eq!(lines_a, lines_b);
}

// Search preserves file order, and the match cap short-circuits the scan
// rather than scanning everything and truncating.
#[test]
fn search_preserves_order_and_short_circuits() {
    let file = corpus(1000);
    let store = LogStore::open(file.path(), StoreOptions::default()).unwrap();

    let all = store
        .search(&SearchQuery::new("CmMacAddress"), &CancellationToken::new())
        .unwrap();
    let numbers: Vec<u64> = all.working_set.rows().iter().map(|r| r.line_number).collect();
    let mut sorted = numbers.clone();
    sorted.sort_unstable();
    assert_eq!(numbers, sorted);

    let capped = store
        .search(
            &SearchQuery::new("CmMacAddress").max_matches(10),
            &CancellationToken::new(),
        )
        .unwrap();
    assert_eq!(capped.working_set.len(), 10);
    assert!(capped.lines_scanned < 1000, "scan did not short-circuit");
}

// Summarization is deterministic for a fixed working set and query, and
// stays inside its size contract even on large inputs.
#[test]
fn summarizer_is_deterministic_and_bounded() {
    let file = corpus(3000);
    let store = LogStore::open(file.path(), StoreOptions::default()).unwrap();
    let ws = store
        .search(&SearchQuery::new("CmMacAddress"), &CancellationToken::new())
        .unwrap()
        .working_set;

    let catalog = Arc::new(
        EntityCatalog::from_toml_str(
            r#"
            [kinds.cable_modem]
            aliases = ["cable modem", "cm"]
            fields = ["CmMacAddress"]
            "#,
        )
        .unwrap(),
    );
    let summarizer = SmartSummarizer::new(catalog);
    let a = summarizer.summarize(&ws, Some("how many cm"));
    let b = summarizer.summarize(&ws, Some("how many cm"));
    assert_eq!(a.text, b.text);
    assert_eq!(a.samples, b.samples);
    assert!(a.text.len() <= 2100, "summary text too large: {}", a.text.len());
    // Two orders of magnitude of compression on a 3000-row set.
    assert!(a.samples.len() <= 10);
}

// History is append-only and strictly ordered by iteration.
#[tokio::test]
async fn history_is_monotone() {
    use async_trait::async_trait;
    use sift_context::ContextBuilder;
    use sift_llm::{ChatRequest, ChatResponse, LlmClient, LlmError};
    use sift_op_react::{EngineConfig, ReactEngine};
    use sift_tool_kit::standard_registry;
    use std::sync::Mutex;

    struct RotatingPlanner {
        step: Mutex<usize>,
    }

    #[async_trait]
    impl LlmClient for RotatingPlanner {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
            let mut step = self.step.lock().unwrap();
            *step += 1;
            Ok(ChatResponse::new(match *step {
                1 => r#"{"action": "grep_logs", "params": {"pattern": "ERROR"}}"#,
                2 => "unparsable",
                3 => r#"{"action": "parse_json_field", "params": {"field_name": "CmMacAddress"}}"#,
                _ => r#"{"action": "finalize_answer", "params": {"answer": "done"}}"#,
            }))
        }
    }

    let file = corpus(100);
    let store = Arc::new(LogStore::open(file.path(), StoreOptions::default()).unwrap());
    let catalog = Arc::new(EntityCatalog::empty());
    let planner: Arc<dyn LlmClient> = Arc::new(RotatingPlanner {
        step: Mutex::new(0),
    });
    let registry = standard_registry(
        Arc::clone(&store),
        Arc::clone(&catalog),
        Arc::clone(&planner),
        "analyzer",
    );
    let engine = ReactEngine::new(
        planner,
        registry,
        ContextBuilder::new(Arc::clone(&catalog)),
        SmartSummarizer::new(catalog),
        store,
        EngineConfig::default(),
    );

    let outcome = engine
        .run("order check", CancellationToken::new())
        .await;
    assert_eq!(outcome.history.len(), 4);
    for window in outcome.history.windows(2) {
        assert!(window[0].iteration < window[1].iteration);
    }
    // Exactly one entry per iteration, including the failed planner step.
    let iterations: Vec<u32> = outcome.history.iter().map(|e| e.iteration).collect();
    assert_eq!(iterations, [1, 2, 3, 4]);
}
