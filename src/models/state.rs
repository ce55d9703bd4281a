//! 对话状态

use serde::{Deserialize, Serialize};

use crate::models::message::Message;

/// 单轮对话的状态
///
/// 只由轮次控制器在步骤之间修改，模型本身不会修改它。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    /// 对话消息
    pub messages: Vec<Message>,
    /// 用户的核心记忆
    pub core_memories: Vec<String>,
    /// 本轮检索到的对话记忆
    pub conversational_memories: Vec<String>,
}

impl ConversationState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            core_memories: Vec::new(),
            conversational_memories: Vec::new(),
        }
    }

    /// `<core_memory>` 上下文块
    pub fn core_memory_block(&self) -> String {
        format!(
            "<core_memory>\n{}\n</core_memory>",
            self.core_memories.join("\n")
        )
    }

    /// `<conversational_memory>` 上下文块
    pub fn conversational_memory_block(&self) -> String {
        format!(
            "<conversational_memory>\n{}\n</conversational_memory>",
            self.conversational_memories.join("\n")
        )
    }
}
