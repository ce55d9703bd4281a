//! 记忆加载
//!
//! 每轮开始时把对话历史展开为文本，截取末尾 token 预算内的部分作为检索查询，
//! 然后并发读取核心记忆和检索对话记忆。两者都成功才算加载完成。

use std::sync::Arc;

use crate::error::Result;
use crate::index::{Tokenizer, truncate_to_token_budget};
use crate::models::{
    ConversationalMemoryRepository, CoreMemoryRepository, Message, buffer_string,
};
use crate::services::turn::TurnContext;

/// 加载结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedMemories {
    pub core_memories: Vec<String>,
    pub conversational_memories: Vec<String>,
}

pub struct MemoryLoader {
    core: Arc<dyn CoreMemoryRepository>,
    conversational: Arc<dyn ConversationalMemoryRepository>,
    tokenizer: Arc<dyn Tokenizer>,
    token_budget: usize,
    top_k: usize,
}

impl MemoryLoader {
    pub fn new(
        core: Arc<dyn CoreMemoryRepository>,
        conversational: Arc<dyn ConversationalMemoryRepository>,
        tokenizer: Arc<dyn Tokenizer>,
        token_budget: usize,
        top_k: usize,
    ) -> Self {
        Self {
            core,
            conversational,
            tokenizer,
            token_budget,
            top_k,
        }
    }

    /// 检索查询：对话记录末尾不超过预算的部分
    pub fn search_query(&self, history: &[Message]) -> Result<String> {
        let transcript = buffer_string(history);
        let query = truncate_to_token_budget(self.tokenizer.as_ref(), &transcript, self.token_budget)?;
        Ok(query.to_string())
    }

    pub async fn load(
        &self,
        ctx: &TurnContext,
        user_id: &str,
        history: &[Message],
    ) -> Result<LoadedMemories> {
        let query = self.search_query(history)?;

        let (core, conversational_memories) = tokio::try_join!(
            ctx.run(self.core.fetch(user_id)),
            ctx.run(self.conversational.search(user_id, &query, self.top_k)),
        )?;
        let (_, core_memories) = core;

        tracing::debug!(
            "Loaded {} core and {} conversational memories for user {}",
            core_memories.len(),
            conversational_memories.len(),
            user_id
        );

        Ok(LoadedMemories {
            core_memories,
            conversational_memories,
        })
    }
}
