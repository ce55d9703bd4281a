//! 推理步骤
//!
//! 把记忆块和当前时间注入系统提示词，调用绑定了工具的模型。
//! 系统提示词每次调用时重新生成，不写入对话历史。

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::TurnConfig;
use crate::error::{AppError, Result};
use crate::llm::{CompletionRequest, LanguageModel, ToolSchema};
use crate::models::{ConversationState, Message};
use crate::services::turn::TurnContext;

const INSTRUCTIONS: &str = "\
You are a helpful assistant with advanced long-term memory capabilities. \
You are powered by a stateless language model, so you must rely on external \
memory to keep information between conversations. Use the memory tools to store \
and retrieve details that help you attend to the user's needs and understand \
their context.

Memory usage guidelines:
1. Use store_update_core_memory for short, stable facts about the user such as \
their name, preferences and goals. Core memories are listed in order starting \
at index 0; pass an index to replace an outdated entry.
2. Use save_conversational_memory for details of the conversation worth \
recalling later.
3. Use search_conversational_memories when the memories below do not cover \
what you need.
4. Use search_web for current information you do not know.
5. Do not tell the user that you are saving memories unless they ask.";

/// 一次推理的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningOutcome {
    /// 最终回答
    Final(Message),
    /// 至少一个工具调用请求
    ToolCalls(Message),
}

pub struct ReasoningStep {
    model: Arc<dyn LanguageModel>,
    tools: Vec<ToolSchema>,
}

impl ReasoningStep {
    pub fn new(model: Arc<dyn LanguageModel>, tools: Vec<ToolSchema>) -> Self {
        Self { model, tools }
    }

    pub fn system_prompt(state: &ConversationState, now: DateTime<Utc>) -> String {
        format!(
            "{}\n\n{}\n\n{}\n\nCurrent time: {}",
            INSTRUCTIONS,
            state.core_memory_block(),
            state.conversational_memory_block(),
            now.to_rfc3339()
        )
    }

    pub async fn invoke(
        &self,
        ctx: &TurnContext,
        turn: &TurnConfig,
        state: &ConversationState,
    ) -> Result<ReasoningOutcome> {
        let mut messages = Vec::with_capacity(state.messages.len() + 1);
        messages.push(Message::system(Self::system_prompt(state, Utc::now())));
        messages.extend(state.messages.iter().cloned());

        let request = CompletionRequest {
            model: turn.model.clone(),
            temperature: turn.temperature,
            messages,
            tools: self.tools.clone(),
        };

        let message = ctx.run(self.model.complete(request)).await?;

        if message.has_tool_calls() {
            Ok(ReasoningOutcome::ToolCalls(message))
        } else if !message.content.trim().is_empty() {
            Ok(ReasoningOutcome::Final(message))
        } else {
            Err(AppError::ModelInvocation(
                "Model returned neither content nor tool calls".into(),
            ))
        }
    }
}
