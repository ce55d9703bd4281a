//! 轮次控制器
//!
//! 状态机：`LoadingMemory → Reasoning → (DispatchingTools → Reasoning)* → Done`。
//! 每轮有工具循环次数上限和截止时间；本轮产生的消息只在成功时返回给会话层。

pub mod context;

pub use context::{CancelHandle, TurnContext};

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TurnConfig;
use crate::config::config::AgentConfig;
use crate::error::{AppError, Result};
use crate::models::{ConversationState, Message};
use crate::observability::AgentMetrics;
use crate::services::memory_loader::MemoryLoader;
use crate::services::reasoning::{ReasoningOutcome, ReasoningStep};
use crate::tools::ToolRegistry;

/// 轮次状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnPhase {
    LoadingMemory,
    Reasoning,
    DispatchingTools,
    Done,
}

/// 一轮对话的结果
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// 最终回答
    pub message: Message,
    /// 经过的状态序列
    pub trace: Vec<TurnPhase>,
    /// 工具分发循环次数
    pub tool_cycles: usize,
    /// 本轮新增的消息：用户消息、工具调用、工具结果和最终回答
    pub new_messages: Vec<Message>,
}

pub struct TurnController {
    loader: MemoryLoader,
    reasoning: ReasoningStep,
    tools: Arc<ToolRegistry>,
    max_tool_cycles: usize,
    turn_timeout: Duration,
    metrics: Arc<AgentMetrics>,
}

impl TurnController {
    pub fn new(
        loader: MemoryLoader,
        reasoning: ReasoningStep,
        tools: Arc<ToolRegistry>,
        agent: &AgentConfig,
        metrics: Arc<AgentMetrics>,
    ) -> Self {
        Self {
            loader,
            reasoning,
            tools,
            max_tool_cycles: agent.max_tool_cycles,
            turn_timeout: Duration::from_secs(agent.turn_timeout_secs),
            metrics,
        }
    }

    /// 使用默认截止时间运行一轮
    pub async fn run_turn(
        &self,
        turn: &TurnConfig,
        history: &[Message],
        user_message: Message,
    ) -> Result<TurnOutcome> {
        let ctx = TurnContext::new(self.turn_timeout);
        self.run_turn_with(&ctx, turn, history, user_message).await
    }

    pub async fn run_turn_with(
        &self,
        ctx: &TurnContext,
        turn: &TurnConfig,
        history: &[Message],
        user_message: Message,
    ) -> Result<TurnOutcome> {
        let result = self.drive(ctx, turn, history, user_message).await;
        self.metrics.record_turn(result.is_ok());

        match &result {
            Ok(outcome) => tracing::info!(
                "Turn completed for user {} on thread {} after {} tool cycles",
                turn.user_id,
                turn.thread_id,
                outcome.tool_cycles
            ),
            Err(e) => tracing::error!(
                "Turn failed for user {} on thread {}: {}",
                turn.user_id,
                turn.thread_id,
                e
            ),
        }
        result
    }

    async fn drive(
        &self,
        ctx: &TurnContext,
        turn: &TurnConfig,
        history: &[Message],
        user_message: Message,
    ) -> Result<TurnOutcome> {
        let first_new = history.len();
        let mut messages = history.to_vec();
        messages.push(user_message);
        let mut state = ConversationState::new(messages);

        let mut trace = vec![TurnPhase::LoadingMemory];
        let loaded = self.loader.load(ctx, &turn.user_id, &state.messages).await?;
        state.core_memories = loaded.core_memories;
        state.conversational_memories = loaded.conversational_memories;

        let mut tool_cycles = 0;
        loop {
            trace.push(TurnPhase::Reasoning);
            self.metrics.record_model_call();

            match self.reasoning.invoke(ctx, turn, &state).await? {
                ReasoningOutcome::Final(message) => {
                    trace.push(TurnPhase::Done);
                    state.messages.push(message.clone());
                    let new_messages = state.messages.split_off(first_new);
                    return Ok(TurnOutcome {
                        message,
                        trace,
                        tool_cycles,
                        new_messages,
                    });
                }
                ReasoningOutcome::ToolCalls(message) => {
                    if tool_cycles >= self.max_tool_cycles {
                        return Err(AppError::TurnBudgetExceeded(self.max_tool_cycles));
                    }
                    tool_cycles += 1;
                    trace.push(TurnPhase::DispatchingTools);

                    let results = self.tools.dispatch(ctx, turn, &message.tool_calls).await?;
                    let errors = results.iter().filter(|r| r.is_error).count();
                    self.metrics.record_tool_cycle(results.len(), errors);
                    tracing::debug!(
                        "Tool cycle {} dispatched {} calls ({} errors)",
                        tool_cycles,
                        results.len(),
                        errors
                    );

                    state.messages.push(message);
                    state
                        .messages
                        .extend(results.into_iter().map(Message::from));
                }
            }
        }
    }
}
