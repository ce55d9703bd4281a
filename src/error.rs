//! 错误处理模块
//!
//! 定义智能体的错误类型和错误处理逻辑。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 核心记忆索引越界
    #[error("核心记忆索引越界: index {index}, 当前长度 {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    /// 嵌入模型错误
    #[error("嵌入模型错误: {0}")]
    Embedding(String),

    /// 向量存储错误
    #[error("向量存储错误: {0}")]
    VectorStore(String),

    /// 语言模型调用失败
    #[error("语言模型调用失败: {0}")]
    ModelInvocation(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 单轮工具调用次数超限
    #[error("单轮工具调用循环超过上限: {0}")]
    TurnBudgetExceeded(usize),

    /// 超时错误
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 本轮已取消
    #[error("本轮已取消")]
    Cancelled,

    /// 工具参数错误
    #[error("工具参数错误: {0}")]
    ToolArguments(String),

    /// 网络搜索错误
    #[error("网络搜索错误: {0}")]
    WebSearch(String),

    /// 参数验证错误
    #[error("参数验证失败: {0}")]
    Validation(String),

    /// 资源不存在
    #[error("资源不存在: {0}")]
    NotFound(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// HTTP 错误
    #[error("HTTP 错误: {0}")]
    Http(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(String),
}

impl AppError {
    /// 是否属于检索失败（嵌入或向量存储）
    pub fn is_retrieval_failure(&self) -> bool {
        matches!(
            self,
            AppError::Embedding(_) | AppError::VectorStore(_)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Timeout(e.to_string())
        } else {
            AppError::Http(e.to_string())
        }
    }
}

/// Axum response implementation for AppError
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = (&self).into();
        let body = Json(ErrorResponse::new(&code, &self.to_string()));
        (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        )
            .into_response()
    }
}

/// 错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,
    /// 错误消息
    pub message: String,
}

impl ErrorResponse {
    /// 创建新错误响应
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// HTTP 状态码映射
impl From<&AppError> for (u16, String) {
    fn from(err: &AppError) -> (u16, String) {
        match err {
            AppError::Validation(_) | AppError::ToolArguments(_) => {
                (400, "BAD_REQUEST".to_string())
            }
            AppError::IndexOutOfBounds { .. } => (400, "INDEX_OUT_OF_BOUNDS".to_string()),
            AppError::NotFound(_) => (404, "NOT_FOUND".to_string()),
            AppError::Timeout(_) => (408, "TIMEOUT".to_string()),
            AppError::Cancelled => (499, "CANCELLED".to_string()),
            AppError::ModelInvocation(_) => (502, "MODEL_ERROR".to_string()),
            AppError::WebSearch(_) => (502, "SEARCH_ERROR".to_string()),
            e if e.is_retrieval_failure() => (503, "RETRIEVAL_ERROR".to_string()),
            AppError::Config(_) => (500, "CONFIG_ERROR".to_string()),
            AppError::TurnBudgetExceeded(_) => (500, "TURN_BUDGET_EXCEEDED".to_string()),
            _ => (500, "INTERNAL_ERROR".to_string()),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_failure_classification() {
        assert!(AppError::Embedding("down".into()).is_retrieval_failure());
        assert!(AppError::VectorStore("down".into()).is_retrieval_failure());
        assert!(!AppError::ModelInvocation("bad".into()).is_retrieval_failure());
        assert!(!AppError::IndexOutOfBounds { index: 3, len: 1 }.is_retrieval_failure());
    }

    #[test]
    fn test_status_mapping() {
        let (status, code): (u16, String) = (&AppError::Config("x".into())).into();
        assert_eq!(status, 500);
        assert_eq!(code, "CONFIG_ERROR");

        let (status, _): (u16, String) = (&AppError::VectorStore("x".into())).into();
        assert_eq!(status, 503);

        let (status, code): (u16, String) = (&AppError::TurnBudgetExceeded(8)).into();
        assert_eq!(status, 500);
        assert_eq!(code, "TURN_BUDGET_EXCEEDED");
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let response = AppError::NotFound("Thread alice/t1".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "code": "NOT_FOUND",
                "message": "资源不存在: Thread alice/t1"
            })
        );
    }
}
