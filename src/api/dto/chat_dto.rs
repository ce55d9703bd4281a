//! 对话 DTO
//!
//! 定义对话相关的请求和响应数据结构。

use serde::{Deserialize, Serialize};

use crate::config::TurnOverrides;
use crate::models::Message;
use crate::services::{ChatReply, TurnPhase};

/// 对话请求
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    /// 用户消息
    pub message: String,
    /// 模型别名或模型 ID
    pub model: Option<String>,
    /// 温度
    pub temperature: Option<f32>,
    /// 用户 ID
    pub user_id: Option<String>,
    /// 线程 ID
    pub thread_id: Option<String>,
}

impl ChatRequest {
    pub fn overrides(&self) -> TurnOverrides {
        TurnOverrides {
            model: self.model.clone(),
            temperature: self.temperature,
            user_id: self.user_id.clone(),
            thread_id: self.thread_id.clone(),
        }
    }
}

/// 对话响应
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub user_id: String,
    pub thread_id: String,
    pub model: String,
    pub tool_cycles: usize,
    pub trace: Vec<TurnPhase>,
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            answer: reply.answer,
            user_id: reply.user_id,
            thread_id: reply.thread_id,
            model: reply.model,
            tool_cycles: reply.tool_cycles,
            trace: reply.trace,
        }
    }
}

/// 线程消息列表响应
#[derive(Debug, Serialize)]
pub struct ThreadMessagesResponse {
    pub user_id: String,
    pub thread_id: String,
    pub messages: Vec<Message>,
    pub total: usize,
}
