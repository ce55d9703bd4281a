//! 工具层
//!
//! 固定的四个工具，按名称查表分发。工具本身无状态，状态都在记忆仓储中。
//! 工具级错误（未知工具、参数错误、索引越界、搜索失败）作为 `Error:`
//! 开头的工具结果返回给模型；检索失败则终止整轮。

pub mod web_search;

pub use web_search::{DisabledWebSearch, TavilySearch, WebSearch, create_web_search};

use futures_util::future::try_join_all;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::config::TurnConfig;
use crate::error::{AppError, Result};
use crate::llm::ToolSchema;
use crate::models::{
    ConversationalMemoryRepository, CoreMemoryRepository, ToolCallRequest, ToolResult,
};
use crate::services::turn::TurnContext;

pub const CORE_MEMORY_STORED: &str = "Memory stored.";

/// 可用工具
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    SearchWeb,
    SaveConversationalMemory,
    StoreUpdateCoreMemory,
    SearchConversationalMemories,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::SearchWeb,
        ToolKind::SaveConversationalMemory,
        ToolKind::StoreUpdateCoreMemory,
        ToolKind::SearchConversationalMemories,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::SearchWeb => "search_web",
            ToolKind::SaveConversationalMemory => "save_conversational_memory",
            ToolKind::StoreUpdateCoreMemory => "store_update_core_memory",
            ToolKind::SearchConversationalMemories => "search_conversational_memories",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    fn description(&self) -> &'static str {
        match self {
            ToolKind::SearchWeb => "Search the web for up-to-date information.",
            ToolKind::SaveConversationalMemory => {
                "Save a memory to the database for later semantic retrieval."
            }
            ToolKind::StoreUpdateCoreMemory => {
                "Store a core memory about the user. Without an index the memory is \
                 inserted first; with an index it replaces the memory at that position."
            }
            ToolKind::SearchConversationalMemories => {
                "Search conversational memories based on semantic similarity."
            }
        }
    }

    fn parameters(&self) -> Value {
        match self {
            ToolKind::SearchWeb => parameters_schema::<SearchWebArgs>(),
            ToolKind::SaveConversationalMemory => {
                parameters_schema::<SaveConversationalMemoryArgs>()
            }
            ToolKind::StoreUpdateCoreMemory => parameters_schema::<StoreUpdateCoreMemoryArgs>(),
            ToolKind::SearchConversationalMemories => {
                parameters_schema::<SearchConversationalMemoriesArgs>()
            }
        }
    }

    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

fn parameters_schema<T: JsonSchema>() -> Value {
    let mut value = serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| json!({ "type": "object" }));
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    value
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchWebArgs {
    #[schemars(description = "The search query.")]
    pub query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveConversationalMemoryArgs {
    #[schemars(description = "The memory to be saved.")]
    pub memory: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StoreUpdateCoreMemoryArgs {
    #[schemars(description = "The memory to store.")]
    pub memory: String,
    #[serde(default)]
    #[schemars(description = "The index of an existing memory to replace.")]
    pub index: Option<i64>,
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchConversationalMemoriesArgs {
    #[schemars(description = "The search query.")]
    pub query: String,
    #[serde(default = "default_top_k")]
    #[schemars(description = "The number of results to return.")]
    pub top_k: usize,
}

fn parse_args<T: DeserializeOwned>(call: &ToolCallRequest) -> Result<T> {
    serde_json::from_value(call.arguments.clone())
        .map_err(|e| AppError::ToolArguments(format!("{}: {}", call.name, e)))
}

/// 模型可见的工具错误描述；返回 None 表示该错误应终止本轮
fn tool_error_message(err: &AppError) -> Option<String> {
    match err {
        AppError::IndexOutOfBounds { .. } => Some("Index out of bounds.".to_string()),
        AppError::ToolArguments(message) => Some(format!("Invalid arguments: {}", message)),
        AppError::WebSearch(message) => Some(format!("Web search failed: {}", message)),
        _ => None,
    }
}

/// 工具注册表
pub struct ToolRegistry {
    core: Arc<dyn CoreMemoryRepository>,
    conversational: Arc<dyn ConversationalMemoryRepository>,
    web_search: Arc<dyn WebSearch>,
}

impl ToolRegistry {
    pub fn new(
        core: Arc<dyn CoreMemoryRepository>,
        conversational: Arc<dyn ConversationalMemoryRepository>,
        web_search: Arc<dyn WebSearch>,
    ) -> Self {
        Self {
            core,
            conversational,
            web_search,
        }
    }

    /// 绑定到模型请求上的全部工具 schema
    pub fn schemas(&self) -> Vec<ToolSchema> {
        ToolKind::ALL.iter().map(ToolKind::schema).collect()
    }

    /// 并发执行一批工具调用，结果按请求顺序返回
    pub async fn dispatch(
        &self,
        ctx: &TurnContext,
        turn: &TurnConfig,
        calls: &[ToolCallRequest],
    ) -> Result<Vec<ToolResult>> {
        try_join_all(calls.iter().map(|call| self.execute(ctx, turn, call))).await
    }

    async fn execute(
        &self,
        ctx: &TurnContext,
        turn: &TurnConfig,
        call: &ToolCallRequest,
    ) -> Result<ToolResult> {
        let Some(kind) = ToolKind::from_name(&call.name) else {
            tracing::warn!("Model requested unknown tool: {}", call.name);
            return Ok(ToolResult::error(call, format!("Unknown tool: {}", call.name)));
        };

        tracing::debug!("Executing tool {} ({})", call.name, call.id);

        match self.invoke(ctx, turn, kind, call).await {
            Ok(content) => Ok(ToolResult::success(call, content)),
            Err(err) => match tool_error_message(&err) {
                Some(message) => {
                    tracing::warn!("Tool {} failed: {}", call.name, err);
                    Ok(ToolResult::error(call, message))
                }
                None => Err(err),
            },
        }
    }

    async fn invoke(
        &self,
        ctx: &TurnContext,
        turn: &TurnConfig,
        kind: ToolKind,
        call: &ToolCallRequest,
    ) -> Result<String> {
        let user_id = turn.user_id.as_str();

        match kind {
            ToolKind::SearchWeb => {
                let args: SearchWebArgs = parse_args(call)?;
                let snippets = ctx.run(self.web_search.search(&args.query)).await?;
                Ok(serde_json::to_string(&snippets)?)
            }
            ToolKind::SaveConversationalMemory => {
                let args: SaveConversationalMemoryArgs = parse_args(call)?;
                ctx.run(self.conversational.save(user_id, &args.memory))
                    .await
            }
            ToolKind::StoreUpdateCoreMemory => {
                let args: StoreUpdateCoreMemoryArgs = parse_args(call)?;
                ctx.run(self.core.store_or_update(user_id, &args.memory, args.index))
                    .await?;
                Ok(CORE_MEMORY_STORED.to_string())
            }
            ToolKind::SearchConversationalMemories => {
                let args: SearchConversationalMemoriesArgs = parse_args(call)?;
                let memories = ctx
                    .run(self.conversational.search(user_id, &args.query, args.top_k))
                    .await?;
                Ok(serde_json::to_string(&memories)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ModelCatalog, TurnOverrides};
    use crate::index::HashingEmbeddingModel;
    use crate::models::conversational_memory_repository::MockConversationalMemoryRepository;
    use crate::models::core_memory_repository::MockCoreMemoryRepository;
    use crate::models::{ConversationalMemoryRepositoryImpl, CoreMemoryRepositoryImpl};
    use crate::storage::InMemoryStore;
    use crate::tools::web_search::MockWebSearch;
    use std::time::Duration;

    fn turn() -> TurnConfig {
        let overrides = TurnOverrides {
            user_id: Some("alice".into()),
            ..Default::default()
        };
        TurnConfig::resolve(&AppConfig::development(), &ModelCatalog::builtin(), overrides)
            .unwrap()
    }

    fn ctx() -> TurnContext {
        TurnContext::new(Duration::from_secs(5))
    }

    fn call(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    fn registry_with_store() -> ToolRegistry {
        let store = Arc::new(InMemoryStore::new(32));
        let embedding = Arc::new(HashingEmbeddingModel::new(32));
        let mut search = MockWebSearch::new();
        search
            .expect_search()
            .returning(|q| Ok(vec![format!("result for {}", q)]));

        ToolRegistry::new(
            Arc::new(CoreMemoryRepositoryImpl::new(store.clone(), "test", 32)),
            Arc::new(ConversationalMemoryRepositoryImpl::new(embedding, store, "test")),
            Arc::new(search),
        )
    }

    #[test]
    fn test_tool_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("delete_everything"), None);
    }

    #[test]
    fn test_schemas_describe_arguments() {
        let registry = registry_with_store();
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 4);

        let core = schemas
            .iter()
            .find(|s| s.name == "store_update_core_memory")
            .unwrap();
        assert_eq!(core.parameters["type"], "object");
        assert!(core.parameters["properties"]["memory"].is_object());
        assert!(core.parameters["properties"]["index"].is_object());
        assert_eq!(core.parameters["required"], json!(["memory"]));
    }

    #[tokio::test]
    async fn test_core_memory_tool_messages() {
        let registry = registry_with_store();
        let results = registry
            .dispatch(
                &ctx(),
                &turn(),
                &[call("1", "store_update_core_memory", json!({ "memory": "likes tea" }))],
            )
            .await
            .unwrap();
        assert_eq!(results[0].content, "Memory stored.");
        assert!(!results[0].is_error);

        let results = registry
            .dispatch(
                &ctx(),
                &turn(),
                &[call(
                    "2",
                    "store_update_core_memory",
                    json!({ "memory": "x", "index": 5 }),
                )],
            )
            .await
            .unwrap();
        assert_eq!(results[0].content, "Error: Index out of bounds.");
        assert!(results[0].is_error);
    }

    #[tokio::test]
    async fn test_save_then_search_conversational() {
        let registry = registry_with_store();
        let saved = registry
            .dispatch(
                &ctx(),
                &turn(),
                &[call("1", "save_conversational_memory", json!({ "memory": "plays violin" }))],
            )
            .await
            .unwrap();
        assert_eq!(saved[0].content, "plays violin");

        let found = registry
            .dispatch(
                &ctx(),
                &turn(),
                &[call("2", "search_conversational_memories", json!({ "query": "violin" }))],
            )
            .await
            .unwrap();
        let memories: Vec<String> = serde_json::from_str(&found[0].content).unwrap();
        assert_eq!(memories, vec!["plays violin"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments_become_error_results() {
        let registry = registry_with_store();
        let results = registry
            .dispatch(
                &ctx(),
                &turn(),
                &[
                    call("a", "launch_rockets", json!({})),
                    call("b", "search_web", json!({ "q": "missing query field" })),
                    call("c", "search_web", json!({ "query": "rust" })),
                ],
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].tool_call_id, "a");
        assert!(results[0].content.starts_with("Error: Unknown tool"));
        assert_eq!(results[1].tool_call_id, "b");
        assert!(results[1].content.starts_with("Error: Invalid arguments"));
        assert_eq!(results[2].tool_call_id, "c");
        assert_eq!(results[2].content, "[\"result for rust\"]");
    }

    #[tokio::test]
    async fn test_search_top_k_defaults_to_five() {
        let mut conversational = MockConversationalMemoryRepository::new();
        conversational
            .expect_search()
            .withf(|user, query, top_k| user == "alice" && query == "q" && *top_k == 5)
            .returning(|_, _, _| Ok(vec![]));

        let registry = ToolRegistry::new(
            Arc::new(MockCoreMemoryRepository::new()),
            Arc::new(conversational),
            Arc::new(MockWebSearch::new()),
        );
        let results = registry
            .dispatch(
                &ctx(),
                &turn(),
                &[call("1", "search_conversational_memories", json!({ "query": "q" }))],
            )
            .await
            .unwrap();
        assert_eq!(results[0].content, "[]");
    }

    #[tokio::test]
    async fn test_web_search_failure_is_recovered() {
        let mut search = MockWebSearch::new();
        search
            .expect_search()
            .returning(|_| Err(AppError::WebSearch("quota".into())));

        let registry = ToolRegistry::new(
            Arc::new(MockCoreMemoryRepository::new()),
            Arc::new(MockConversationalMemoryRepository::new()),
            Arc::new(search),
        );
        let results = registry
            .dispatch(&ctx(), &turn(), &[call("1", "search_web", json!({ "query": "q" }))])
            .await
            .unwrap();
        assert!(results[0].content.starts_with("Error: Web search failed"));
    }

    #[tokio::test]
    async fn test_store_failure_fails_the_batch() {
        let mut core = MockCoreMemoryRepository::new();
        core.expect_store_or_update()
            .returning(|_, _, _| Err(AppError::VectorStore("down".into())));

        let registry = ToolRegistry::new(
            Arc::new(core),
            Arc::new(MockConversationalMemoryRepository::new()),
            Arc::new(MockWebSearch::new()),
        );
        let err = registry
            .dispatch(
                &ctx(),
                &turn(),
                &[call("1", "store_update_core_memory", json!({ "memory": "m" }))],
            )
            .await
            .unwrap_err();
        assert!(err.is_retrieval_failure());
    }

    /// 每次搜索都要等另一次搜索到达屏障，串行执行会超时
    struct BarrierSearch {
        barrier: Arc<tokio::sync::Barrier>,
    }

    #[async_trait::async_trait]
    impl WebSearch for BarrierSearch {
        async fn search(&self, query: &str) -> Result<Vec<String>> {
            tokio::time::timeout(Duration::from_secs(2), self.barrier.wait())
                .await
                .map_err(|_| AppError::Internal("searches did not overlap".into()))?;
            Ok(vec![format!("result for {}", query)])
        }
    }

    #[tokio::test]
    async fn test_batch_calls_run_concurrently() {
        let registry = ToolRegistry::new(
            Arc::new(MockCoreMemoryRepository::new()),
            Arc::new(MockConversationalMemoryRepository::new()),
            Arc::new(BarrierSearch {
                barrier: Arc::new(tokio::sync::Barrier::new(2)),
            }),
        );

        let results = registry
            .dispatch(
                &ctx(),
                &turn(),
                &[
                    call("a", "search_web", json!({ "query": "first" })),
                    call("b", "search_web", json!({ "query": "second" })),
                ],
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_call_id, "a");
        assert_eq!(results[0].content, r#"["result for first"]"#);
        assert_eq!(results[1].tool_call_id, "b");
        assert_eq!(results[1].content, r#"["result for second"]"#);
    }
}
