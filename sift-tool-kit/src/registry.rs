//! Wiring helper: the standard tool registry.

use std::sync::Arc;

use sift_catalog::EntityCatalog;
use sift_llm::LlmClient;
use sift_store::LogStore;
use sift_tool::ToolRegistry;

use crate::{
    AggregateByFieldTool, AnalyzeLogsTool, CountUniquePerGroupTool, CountValuesTool,
    ExtractTimeRangeTool, ExtractUniqueTool, FinalizeAnswerTool, GrepAndParseTool, GrepLogsTool,
    ParseJsonFieldTool, RelationshipChainTool, RelationshipCountTool, ReturnLogsTool,
    SortByTimeTool, SummarizeLogsTool,
};

/// The full tool set over shared service handles. `analyzer_model` names
/// the model for `analyze_logs`; pass the planner's model to share one.
pub fn standard_registry(
    store: Arc<LogStore>,
    catalog: Arc<EntityCatalog>,
    llm: Arc<dyn LlmClient>,
    analyzer_model: impl Into<String>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(GrepLogsTool::new(Arc::clone(&store))));
    registry.register(Arc::new(ParseJsonFieldTool));
    registry.register(Arc::new(ExtractUniqueTool));
    registry.register(Arc::new(CountValuesTool));
    registry.register(Arc::new(GrepAndParseTool::new(Arc::clone(&store))));
    registry.register(Arc::new(RelationshipChainTool::new(
        Arc::clone(&store),
        Arc::clone(&catalog),
    )));
    registry.register(Arc::new(CountUniquePerGroupTool));
    registry.register(Arc::new(RelationshipCountTool::new(
        Arc::clone(&store),
        Arc::clone(&catalog),
    )));
    registry.register(Arc::new(SortByTimeTool));
    registry.register(Arc::new(ExtractTimeRangeTool));
    registry.register(Arc::new(AggregateByFieldTool));
    registry.register(Arc::new(SummarizeLogsTool::new(Arc::clone(&catalog))));
    registry.register(Arc::new(AnalyzeLogsTool::new(llm, analyzer_model)));
    registry.register(Arc::new(ReturnLogsTool));
    registry.register(Arc::new(FinalizeAnswerTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_support::store_with;
    use async_trait::async_trait;
    use sift_llm::{ChatRequest, ChatResponse, LlmError};

    struct NullLlm;

    #[async_trait]
    impl LlmClient for NullLlm {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
            Err(LlmError::Timeout)
        }
    }

    #[test]
    fn registry_carries_the_full_tool_set() {
        let (_file, store) = store_with(&[r#"t1,h,"x""#]);
        let catalog = Arc::new(EntityCatalog::empty());
        let registry = standard_registry(store, catalog, Arc::new(NullLlm), "analyzer");

        for name in [
            "grep_logs",
            "parse_json_field",
            "extract_unique",
            "count_values",
            "grep_and_parse",
            "find_relationship_chain",
            "count_unique_per_group",
            "count_via_relationship",
            "sort_by_time",
            "extract_time_range",
            "aggregate_by_field",
            "summarize_logs",
            "analyze_logs",
            "return_logs",
            "finalize_answer",
        ] {
            assert!(registry.get(name).is_some(), "missing tool: {name}");
        }
        assert_eq!(registry.len(), 15);
    }

    #[test]
    fn catalogs_mention_every_tool() {
        let (_file, store) = store_with(&[r#"t1,h,"x""#]);
        let catalog = Arc::new(EntityCatalog::empty());
        let registry = standard_registry(store, catalog, Arc::new(NullLlm), "analyzer");
        let compact = registry.catalog_compact();
        for name in registry.names() {
            assert!(compact.contains(name));
        }
    }
}
