//! 服务模块
//!
//! 记忆加载、推理步骤、轮次控制器和会话层，以及按配置组装它们的工厂函数。

pub mod memory_loader;
pub mod reasoning;
pub mod session;
pub mod turn;

pub use memory_loader::{LoadedMemories, MemoryLoader};
pub use reasoning::{ReasoningOutcome, ReasoningStep};
pub use session::{ChatAgent, ChatReply};
pub use turn::{CancelHandle, TurnContext, TurnController, TurnOutcome, TurnPhase};

use std::sync::Arc;

use crate::config::{AppConfig, ModelCatalog};
use crate::error::Result;
use crate::index::{EmbeddingModel, Tokenizer, create_embedding_model, create_tokenizer};
use crate::llm::{HttpChatModel, LanguageModel};
use crate::models::{ConversationalMemoryRepositoryImpl, CoreMemoryRepositoryImpl};
use crate::observability::AgentMetrics;
use crate::storage::create_memory_store;
use crate::tools::{ToolRegistry, WebSearch, create_web_search};

/// 按配置创建聊天智能体
pub fn create_chat_agent(config: &AppConfig, metrics: Arc<AgentMetrics>) -> Result<ChatAgent> {
    let model: Arc<dyn LanguageModel> = Arc::new(HttpChatModel::new(&config.llm)?);
    let web_search: Arc<dyn WebSearch> = Arc::from(create_web_search(&config.search)?);
    create_chat_agent_with(config, model, web_search, metrics)
}

/// 使用给定的模型和搜索实现创建聊天智能体
pub fn create_chat_agent_with(
    config: &AppConfig,
    model: Arc<dyn LanguageModel>,
    web_search: Arc<dyn WebSearch>,
    metrics: Arc<AgentMetrics>,
) -> Result<ChatAgent> {
    let dimension = config.store.dimension;
    let namespace = config.store.namespace.as_str();

    let store = create_memory_store(&config.store)?;
    let embedding: Arc<dyn EmbeddingModel> = Arc::from(create_embedding_model(&config.embedding, dimension)?);
    let tokenizer: Arc<dyn Tokenizer> = Arc::from(create_tokenizer(&config.tokenizer)?);

    let core = Arc::new(CoreMemoryRepositoryImpl::new(
        store.clone(),
        namespace,
        dimension,
    ));
    let conversational = Arc::new(ConversationalMemoryRepositoryImpl::new(
        embedding, store, namespace,
    ));

    let tools = Arc::new(ToolRegistry::new(
        core.clone(),
        conversational.clone(),
        web_search,
    ));
    let loader = MemoryLoader::new(
        core,
        conversational,
        tokenizer,
        config.agent.history_token_budget,
        config.agent.search_top_k,
    );
    let reasoning = ReasoningStep::new(model, tools.schemas());
    let controller = TurnController::new(loader, reasoning, tools, &config.agent, metrics);

    tracing::info!(
        "Chat agent ready (store: {}, embedding: {}, tokenizer: {})",
        config.store.backend,
        config.embedding.backend,
        config.tokenizer.backend
    );

    Ok(ChatAgent::new(
        controller,
        config.clone(),
        ModelCatalog::builtin(),
    ))
}
