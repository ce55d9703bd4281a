//! 进程内向量存储
//!
//! 余弦相似度暴力检索，用于开发模式与测试。

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{AppError, Result};
use crate::storage::{MemoryStore, Metadata, QueryMatch, StoreQuery, VectorRecord};

pub struct InMemoryStore {
    /// (namespace, id) -> (vector, metadata)
    records: DashMap<(String, String), (Vec<f32>, Metadata)>,
    dimension: usize,
}

impl InMemoryStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            records: DashMap::new(),
            dimension,
        }
    }

    /// 命名空间内的记录数
    pub fn len(&self, namespace: &str) -> usize {
        self.records
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .count()
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }

    /// 按 ID 读取元数据
    pub fn get(&self, namespace: &str, id: &str) -> Option<Metadata> {
        self.records
            .get(&(namespace.to_string(), id.to_string()))
            .map(|entry| entry.value().1.clone())
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(AppError::VectorStore(format!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn upsert(&self, records: Vec<VectorRecord>, namespace: &str) -> Result<()> {
        for record in &records {
            self.check_dimension(&record.vector)?;
        }

        for record in records {
            self.records.insert(
                (namespace.to_string(), record.id),
                (record.vector, record.metadata),
            );
        }

        Ok(())
    }

    async fn query(&self, query: StoreQuery, namespace: &str) -> Result<Vec<QueryMatch>> {
        self.check_dimension(&query.vector)?;

        let mut results: Vec<QueryMatch> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == namespace && query.filter.matches(&entry.value().1))
            .map(|entry| {
                let ((_, id), (vector, metadata)) = entry.pair();
                QueryMatch {
                    id: id.clone(),
                    score: Self::cosine_similarity(&query.vector, vector),
                    metadata: if query.include_metadata {
                        metadata.clone()
                    } else {
                        Metadata::new()
                    },
                }
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(query.top_k);

        Ok(results)
    }
}
