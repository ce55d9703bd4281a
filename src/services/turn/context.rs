//! 单轮运行上下文：截止时间与取消信号
//!
//! 轮次内所有可能挂起的调用（嵌入、向量存储、模型、网络搜索）
//! 都通过 [`TurnContext::run`] 执行。

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{AppError, Result};

/// 取消句柄，由调用方持有
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Debug, Clone)]
pub struct TurnContext {
    deadline: Instant,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl TurnContext {
    /// 从现在起 `budget` 后到期的上下文
    pub fn new(budget: Duration) -> Self {
        Self {
            deadline: Instant::now() + budget,
            cancel_rx: None,
        }
    }

    /// 创建可取消的上下文
    pub fn cancellable(budget: Duration) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            deadline: Instant::now() + budget,
            cancel_rx: Some(rx),
        };
        (ctx, CancelHandle { tx })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// 在截止时间和取消信号的约束下执行
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let mut cancel_rx = self.cancel_rx.clone();
        tokio::select! {
            result = tokio::time::timeout_at(self.deadline, fut) => {
                result.map_err(|_| AppError::Timeout("Turn deadline exceeded".into()))?
            }
            _ = wait_for_cancel(&mut cancel_rx) => Err(AppError::Cancelled),
        }
    }
}

async fn wait_for_cancel(rx: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // 发送端已丢弃，不会再被取消
            return std::future::pending().await;
        }
    }
}
