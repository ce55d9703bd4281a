//! 会话服务
//!
//! `ChatAgent` 按 (用户, 线程) 保存消息历史，每轮解析一次运行配置后交给
//! 轮次控制器执行。同一线程上的轮次串行执行，失败的轮次不会修改历史。

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{AppConfig, ModelCatalog, TurnConfig, TurnOverrides};
use crate::error::{AppError, Result};
use crate::models::Message;
use crate::services::turn::{TurnController, TurnPhase};

/// 一轮对话的回复
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub answer: String,
    pub user_id: String,
    pub thread_id: String,
    pub model: String,
    pub tool_cycles: usize,
    pub trace: Vec<TurnPhase>,
}

type ThreadKey = (String, String);

pub struct ChatAgent {
    controller: TurnController,
    defaults: AppConfig,
    catalog: ModelCatalog,
    threads: DashMap<ThreadKey, Arc<Mutex<Vec<Message>>>>,
}

impl ChatAgent {
    pub fn new(controller: TurnController, defaults: AppConfig, catalog: ModelCatalog) -> Self {
        Self {
            controller,
            defaults,
            catalog,
            threads: DashMap::new(),
        }
    }

    /// 解析本轮配置，任何一项无效都不会开始本轮
    pub fn resolve_turn(&self, overrides: TurnOverrides) -> Result<TurnConfig> {
        TurnConfig::resolve(&self.defaults, &self.catalog, overrides)
    }

    fn thread(&self, turn: &TurnConfig) -> Arc<Mutex<Vec<Message>>> {
        self.threads
            .entry((turn.user_id.clone(), turn.thread_id.clone()))
            .or_default()
            .clone()
    }

    pub async fn chat(&self, message: &str, overrides: TurnOverrides) -> Result<ChatReply> {
        if message.trim().is_empty() {
            return Err(AppError::Validation("message cannot be empty".into()));
        }
        let turn = self.resolve_turn(overrides)?;

        let thread = self.thread(&turn);
        let mut history = thread.lock().await;

        let outcome = self
            .controller
            .run_turn(&turn, &history, Message::user(message))
            .await?;
        history.extend(outcome.new_messages);

        Ok(ChatReply {
            answer: outcome.message.content,
            user_id: turn.user_id,
            thread_id: turn.thread_id,
            model: turn.model.alias,
            tool_cycles: outcome.tool_cycles,
            trace: outcome.trace,
        })
    }

    /// 线程的消息历史快照
    pub async fn history(&self, user_id: &str, thread_id: &str) -> Vec<Message> {
        let thread = self
            .threads
            .get(&(user_id.to_string(), thread_id.to_string()))
            .map(|entry| entry.value().clone());
        match thread {
            Some(thread) => thread.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// 清空线程历史，等待进行中的轮次结束后再清空
    ///
    /// 线程条目保留在表中，已拿到该线程的轮次仍写入同一份历史。
    /// 线程不存在或已为空时返回 `false`。
    pub async fn clear_thread(&self, user_id: &str, thread_id: &str) -> bool {
        let thread = self
            .threads
            .get(&(user_id.to_string(), thread_id.to_string()))
            .map(|entry| entry.value().clone());
        let Some(thread) = thread else {
            return false;
        };

        let mut history = thread.lock().await;
        let cleared = !history.is_empty();
        history.clear();
        cleared
    }
}
