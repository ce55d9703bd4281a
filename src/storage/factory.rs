//! 存储工厂模块
//!
//! 根据配置创建相应的向量存储实例。

use std::sync::Arc;

use crate::config::config::StoreConfig;
use crate::error::{AppError, Result};
use crate::storage::{InMemoryStore, MemoryStore, PineconeStore};

/// 根据配置创建存储实例
pub fn create_memory_store(config: &StoreConfig) -> Result<Arc<dyn MemoryStore>> {
    match config.backend.as_str() {
        "pinecone" => Ok(Arc::new(PineconeStore::new(config)?)),
        "memory" | "" => Ok(Arc::new(InMemoryStore::new(config.dimension))),
        other => Err(AppError::Config(format!(
            "Unknown store backend: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_create_memory_backend() {
        let config = AppConfig::development();
        assert!(create_memory_store(&config.store).is_ok());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config = AppConfig::development().store;
        config.backend = "redis".into();
        assert!(matches!(
            create_memory_store(&config),
            Err(AppError::Config(_))
        ));
    }
}
