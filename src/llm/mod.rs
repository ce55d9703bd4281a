//! 语言模型模块
//!
//! 模型被视为不透明的补全服务：输入消息序列和可用工具的 schema，
//! 返回一条助手消息，其中要么带有最终回答，要么带有工具调用请求。

pub mod openai;

pub use openai::HttpChatModel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ModelSpec;
use crate::error::Result;
use crate::models::Message;

/// 绑定到模型请求上的工具描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema 格式的参数定义
    pub parameters: Value,
}

/// 补全请求
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: ModelSpec,
    pub temperature: f32,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 请求一次补全，返回助手消息
    async fn complete(&self, request: CompletionRequest) -> Result<Message>;
}
