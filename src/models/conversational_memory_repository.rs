//! 对话记忆仓储

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::index::EmbeddingModel;
use crate::models::memory::{
    ConversationalMemoryEntry, MemoryType, PAYLOAD_KEY, scope_filter, validate_user_id,
};
use crate::storage::{MemoryStore, StoreQuery};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationalMemoryRepository: Send + Sync {
    /// 保存一条对话记忆，返回保存的文本
    ///
    /// 每次调用都会生成新记录，相同文本保存两次会得到两条记录。
    async fn save(&self, user_id: &str, memory: &str) -> Result<String>;

    /// 检索与查询最相似的对话记忆，相似度从高到低
    async fn search(&self, user_id: &str, query: &str, top_k: usize) -> Result<Vec<String>>;
}

pub struct ConversationalMemoryRepositoryImpl {
    embedding: Arc<dyn EmbeddingModel>,
    store: Arc<dyn MemoryStore>,
    namespace: String,
}

impl ConversationalMemoryRepositoryImpl {
    pub fn new(
        embedding: Arc<dyn EmbeddingModel>,
        store: Arc<dyn MemoryStore>,
        namespace: &str,
    ) -> Self {
        Self {
            embedding,
            store,
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait]
impl ConversationalMemoryRepository for ConversationalMemoryRepositoryImpl {
    async fn save(&self, user_id: &str, memory: &str) -> Result<String> {
        validate_user_id(user_id)?;

        let vector = self.embedding.encode(memory).await?;
        let entry = ConversationalMemoryEntry::new(user_id, memory, vector);
        let path = entry.path.clone();

        self.store
            .upsert(vec![entry.into_vector_record()], &self.namespace)
            .await?;

        tracing::info!("Saved conversational memory {}", path);
        Ok(memory.to_string())
    }

    async fn search(&self, user_id: &str, query: &str, top_k: usize) -> Result<Vec<String>> {
        validate_user_id(user_id)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedding.encode(query).await?;
        let filter = scope_filter(user_id, MemoryType::Conversational);

        let matches = self
            .store
            .query(
                StoreQuery {
                    vector,
                    filter: filter.clone(),
                    top_k,
                    include_metadata: true,
                },
                &self.namespace,
            )
            .await?;

        // 后端返回的结果再按范围过一遍
        let memories: Vec<String> = matches
            .into_iter()
            .filter(|m| filter.matches(&m.metadata))
            .filter_map(|m| {
                m.metadata
                    .get(PAYLOAD_KEY)
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .take(top_k)
            .collect();

        tracing::debug!(
            "Conversational search for user {} returned {} memories",
            user_id,
            memories.len()
        );
        Ok(memories)
    }
}
