//! 核心记忆仓储
//!
//! 每个用户一条记录，整条读出、修改后整条写回。
//! 同一用户的写操作在进程内串行执行，避免并发轮次相互覆盖。

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::memory::{
    CoreMemoryRecord, MemoryType, PATH_KEY, core_memory_path, minimal_vector, scope_filter,
    validate_user_id,
};
use crate::storage::{MemoryStore, StoreQuery};

/// 核心记忆仓储 trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CoreMemoryRepository: Send + Sync {
    /// 读取核心记忆，返回 (记录路径, 记忆列表)
    ///
    /// 记录不存在时返回空列表和首次写入将使用的路径。
    async fn fetch(&self, user_id: &str) -> Result<(String, Vec<String>)>;

    /// 写入或更新核心记忆
    ///
    /// `index` 为空时插入到列表头部；否则替换该位置，越界返回
    /// `IndexOutOfBounds` 且不写入。
    async fn store_or_update(&self, user_id: &str, memory: &str, index: Option<i64>)
    -> Result<()>;
}

/// 在内存中应用一次核心记忆修改
pub fn apply_core_update(memories: &mut Vec<String>, memory: &str, index: Option<i64>) -> Result<()> {
    match index {
        Some(index) => {
            if index < 0 || index as usize >= memories.len() {
                return Err(AppError::IndexOutOfBounds {
                    index,
                    len: memories.len(),
                });
            }
            memories[index as usize] = memory.to_string();
        }
        None => memories.insert(0, memory.to_string()),
    }
    Ok(())
}

/// 核心记忆仓储实现
pub struct CoreMemoryRepositoryImpl {
    store: Arc<dyn MemoryStore>,
    namespace: String,
    dimension: usize,
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CoreMemoryRepositoryImpl {
    pub fn new(store: Arc<dyn MemoryStore>, namespace: &str, dimension: usize) -> Self {
        Self {
            store,
            namespace: namespace.to_string(),
            dimension,
            write_locks: DashMap::new(),
        }
    }

    async fn fetch_record(&self, user_id: &str) -> Result<CoreMemoryRecord> {
        validate_user_id(user_id)?;
        let path = core_memory_path(user_id);

        let matches = self
            .store
            .query(
                StoreQuery {
                    vector: minimal_vector(self.dimension),
                    filter: scope_filter(user_id, MemoryType::Core).eq(PATH_KEY, path.as_str()),
                    top_k: 1,
                    include_metadata: true,
                },
                &self.namespace,
            )
            .await?;

        match matches.into_iter().next() {
            Some(found) => CoreMemoryRecord::from_metadata(user_id, &found.metadata),
            None => Ok(CoreMemoryRecord::empty(user_id)),
        }
    }

    fn write_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl CoreMemoryRepository for CoreMemoryRepositoryImpl {
    async fn fetch(&self, user_id: &str) -> Result<(String, Vec<String>)> {
        let record = self.fetch_record(user_id).await?;
        tracing::debug!(
            "Fetched {} core memories for user {}",
            record.memories.len(),
            user_id
        );
        Ok((record.path, record.memories))
    }

    async fn store_or_update(
        &self,
        user_id: &str,
        memory: &str,
        index: Option<i64>,
    ) -> Result<()> {
        let lock = self.write_lock(user_id);
        let _guard = lock.lock().await;

        let mut record = self.fetch_record(user_id).await?;
        apply_core_update(&mut record.memories, memory, index)?;
        record.timestamp = chrono::Utc::now();

        let vector_record = record.to_vector_record(self.dimension)?;
        self.store
            .upsert(vec![vector_record], &self.namespace)
            .await?;

        tracing::info!(
            "Stored core memory for user {} ({} entries)",
            user_id,
            record.memories.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryStore, MockMemoryStore};
    use rstest::rstest;

    fn repository() -> (Arc<InMemoryStore>, CoreMemoryRepositoryImpl) {
        let store = Arc::new(InMemoryStore::new(8));
        let repo = CoreMemoryRepositoryImpl::new(store.clone(), "test", 8);
        (store, repo)
    }

    #[tokio::test]
    async fn test_fetch_missing_record_returns_empty_with_key() {
        let (_, repo) = repository();
        let (path, memories) = repo.fetch("alice").await.unwrap();
        assert_eq!(path, "user/alice/core");
        assert!(memories.is_empty());
    }

    #[tokio::test]
    async fn test_insert_without_index_goes_first() {
        let (_, repo) = repository();
        repo.store_or_update("alice", "first", None).await.unwrap();
        repo.store_or_update("alice", "second", None).await.unwrap();
        repo.store_or_update("alice", "third", None).await.unwrap();

        let (_, memories) = repo.fetch("alice").await.unwrap();
        assert_eq!(memories, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_update_replaces_only_target_index() {
        let (_, repo) = repository();
        for m in ["c", "b", "a"] {
            repo.store_or_update("alice", m, None).await.unwrap();
        }

        repo.store_or_update("alice", "B", Some(1)).await.unwrap();
        let (_, memories) = repo.fetch("alice").await.unwrap();
        assert_eq!(memories, vec!["a", "B", "c"]);
    }

    #[rstest]
    #[case(-1)]
    #[case(2)]
    #[case(100)]
    #[tokio::test]
    async fn test_out_of_range_index_leaves_record_unchanged(#[case] index: i64) {
        let (_, repo) = repository();
        repo.store_or_update("alice", "b", None).await.unwrap();
        repo.store_or_update("alice", "a", None).await.unwrap();

        let err = repo
            .store_or_update("alice", "x", Some(index))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IndexOutOfBounds { .. }));

        let (_, memories) = repo.fetch("alice").await.unwrap();
        assert_eq!(memories, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_index_on_empty_record_fails_without_write() {
        let (store, repo) = repository();
        let err = repo.store_or_update("alice", "x", Some(0)).await.unwrap_err();
        assert!(matches!(err, AppError::IndexOutOfBounds { index: 0, len: 0 }));
        assert!(store.is_empty("test"));
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let (_, repo) = repository();
        repo.store_or_update("alice", "alice fact", None).await.unwrap();
        repo.store_or_update("bob", "bob fact", None).await.unwrap();

        let (_, alice) = repo.fetch("alice").await.unwrap();
        let (_, bob) = repo.fetch("bob").await.unwrap();
        assert_eq!(alice, vec!["alice fact"]);
        assert_eq!(bob, vec!["bob fact"]);
    }

    #[tokio::test]
    async fn test_concurrent_writes_for_same_user_are_not_lost() {
        let (_, repo) = repository();
        let repo = Arc::new(repo);

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.store_or_update("alice", &format!("m{}", i), None)
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let (_, memories) = repo.fetch("alice").await.unwrap();
        assert_eq!(memories.len(), 10);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut store = MockMemoryStore::new();
        store
            .expect_query()
            .returning(|_, _| Err(AppError::VectorStore("unavailable".into())));
        store.expect_upsert().never();

        let repo = CoreMemoryRepositoryImpl::new(Arc::new(store), "test", 8);
        let err = repo.store_or_update("alice", "x", None).await.unwrap_err();
        assert!(err.is_retrieval_failure());
    }

    #[tokio::test]
    async fn test_invalid_user_id_rejected() {
        let (_, repo) = repository();
        assert!(matches!(
            repo.fetch("a/b").await,
            Err(AppError::Validation(_))
        ));
    }
}
