//! 存储层模块
//!
//! 向量存储客户端抽象：`upsert` 与带元数据过滤的相似度 `query`。
//! 支持 Pinecone 与进程内存储两种后端。

pub mod factory;
pub mod memory;
pub mod pinecone;

pub use factory::create_memory_store;
pub use memory::InMemoryStore;
pub use pinecone::PineconeStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// 记录元数据
pub type Metadata = Map<String, Value>;

/// 向量记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    #[serde(rename = "values")]
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

/// 过滤谓词
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Value),
}

impl Predicate {
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Predicate::Eq(expected) => value == Some(expected),
        }
    }
}

/// 元数据过滤条件，所有谓词同时满足才算匹配
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    clauses: Vec<(String, Predicate)>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.clauses
            .push((key.to_string(), Predicate::Eq(value.into())));
        self
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.clauses
            .iter()
            .all(|(key, predicate)| predicate.matches(metadata.get(key)))
    }

    /// Pinecone 过滤语法: `{"key": {"$eq": value}}`
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, predicate) in &self.clauses {
            match predicate {
                Predicate::Eq(value) => {
                    map.insert(key.clone(), serde_json::json!({ "$eq": value }));
                }
            }
        }
        Value::Object(map)
    }
}

/// 查询请求
#[derive(Debug, Clone)]
pub struct StoreQuery {
    pub vector: Vec<f32>,
    pub filter: QueryFilter,
    pub top_k: usize,
    pub include_metadata: bool,
}

/// 查询命中项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Metadata,
}

/// 向量存储客户端
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// 插入或覆盖记录
    async fn upsert(&self, records: Vec<VectorRecord>, namespace: &str) -> Result<()>;

    /// 相似度查询，按相似度从高到低返回
    async fn query(&self, query: StoreQuery, namespace: &str) -> Result<Vec<QueryMatch>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_requires_all_clauses() {
        let filter = QueryFilter::new().eq("user_id", "u1").eq("type", "core");

        let mut metadata = Metadata::new();
        metadata.insert("user_id".into(), json!("u1"));
        metadata.insert("type".into(), json!("core"));
        assert!(filter.matches(&metadata));

        metadata.insert("type".into(), json!("conversational"));
        assert!(!filter.matches(&metadata));

        metadata.remove("type");
        assert!(!filter.matches(&metadata));
    }

    #[test]
    fn test_filter_pinecone_json() {
        let filter = QueryFilter::new().eq("user_id", "u1").eq("type", "core");
        assert_eq!(
            filter.to_json(),
            json!({ "user_id": { "$eq": "u1" }, "type": { "$eq": "core" } })
        );
    }
}
