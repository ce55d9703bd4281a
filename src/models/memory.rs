//! 记忆数据模型
//!
//! 两类记忆共用同一个向量存储，通过 `type` 与 `user_id` 元数据隔离：
//! - 核心记忆：每个用户一条记录，保存短字符串列表
//! - 对话记忆：每条记忆一条记录，只写一次，通过相似度检索

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::storage::{Metadata, QueryFilter, VectorRecord};

pub const PAYLOAD_KEY: &str = "content";
pub const PATH_KEY: &str = "path";
pub const TIMESTAMP_KEY: &str = "timestamp";
pub const TYPE_KEY: &str = "type";
pub const USER_ID_KEY: &str = "user_id";

/// 记忆类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// 核心记忆
    Core,
    /// 对话记忆
    Conversational,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Core => "core",
            MemoryType::Conversational => "conversational",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 校验用户 ID，防止拼出越界的记录路径
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(AppError::Validation("user_id cannot be empty".into()));
    }
    if user_id.contains('/') {
        return Err(AppError::Validation(format!(
            "user_id cannot contain '/': {}",
            user_id
        )));
    }
    Ok(())
}

/// 核心记忆路径: user/{user_id}/core
pub fn core_memory_path(user_id: &str) -> String {
    format!("user/{}/core", user_id)
}

/// 对话记忆路径: user/{user_id}/conversational/{event_id}
pub fn conversational_memory_path(user_id: &str, event_id: &str) -> String {
    format!("user/{}/conversational/{}", user_id, event_id)
}

/// 只有最后一维非零的向量，用于不需要语义检索的记录
pub fn minimal_vector(dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0; dimension];
    if let Some(last) = vector.last_mut() {
        *last = 1e-6;
    }
    vector
}

/// 某用户某类记忆的查询范围
///
/// 仓储只通过这个函数构造过滤条件，保证查询范围与写入时的标签一致。
pub fn scope_filter(user_id: &str, memory_type: MemoryType) -> QueryFilter {
    QueryFilter::new()
        .eq(USER_ID_KEY, user_id)
        .eq(TYPE_KEY, memory_type.as_str())
}

fn base_metadata(
    path: &str,
    user_id: &str,
    memory_type: MemoryType,
    payload: String,
    timestamp: DateTime<Utc>,
) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(PAYLOAD_KEY.into(), Value::String(payload));
    metadata.insert(PATH_KEY.into(), Value::String(path.to_string()));
    metadata.insert(TIMESTAMP_KEY.into(), json!(timestamp.to_rfc3339()));
    metadata.insert(TYPE_KEY.into(), json!(memory_type.as_str()));
    metadata.insert(USER_ID_KEY.into(), Value::String(user_id.to_string()));
    metadata
}

/// 核心记忆 payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CorePayload {
    memories: Vec<String>,
}

/// 核心记忆记录
#[derive(Debug, Clone, PartialEq)]
pub struct CoreMemoryRecord {
    pub user_id: String,
    pub path: String,
    pub memories: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl CoreMemoryRecord {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            path: core_memory_path(user_id),
            memories: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// 从存储元数据解析
    pub fn from_metadata(user_id: &str, metadata: &Metadata) -> Result<Self> {
        let payload = metadata
            .get(PAYLOAD_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::VectorStore("Core memory record has no payload".into()))?;
        let payload: CorePayload = serde_json::from_str(payload)?;

        let timestamp = metadata
            .get(TIMESTAMP_KEY)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Self {
            user_id: user_id.to_string(),
            path: core_memory_path(user_id),
            memories: payload.memories,
            timestamp,
        })
    }

    pub fn to_vector_record(&self, dimension: usize) -> Result<VectorRecord> {
        let payload = serde_json::to_string(&CorePayload {
            memories: self.memories.clone(),
        })?;

        Ok(VectorRecord {
            id: self.path.clone(),
            vector: minimal_vector(dimension),
            metadata: base_metadata(
                &self.path,
                &self.user_id,
                MemoryType::Core,
                payload,
                self.timestamp,
            ),
        })
    }
}

/// 对话记忆条目
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationalMemoryEntry {
    pub path: String,
    pub user_id: String,
    pub content: String,
    pub vector: Vec<f32>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationalMemoryEntry {
    pub fn new(user_id: &str, content: &str, vector: Vec<f32>) -> Self {
        let event_id = uuid::Uuid::new_v4().to_string();
        Self {
            path: conversational_memory_path(user_id, &event_id),
            user_id: user_id.to_string(),
            content: content.to_string(),
            vector,
            timestamp: Utc::now(),
        }
    }

    pub fn into_vector_record(self) -> VectorRecord {
        let metadata = base_metadata(
            &self.path,
            &self.user_id,
            MemoryType::Conversational,
            self.content,
            self.timestamp,
        );
        VectorRecord {
            id: self.path,
            vector: self.vector,
            metadata,
        }
    }
}
