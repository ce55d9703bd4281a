//! Pinecone 向量存储客户端
//!
//! 直接调用 Pinecone data plane REST 接口。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::config::StoreConfig;
use crate::error::{AppError, Result};
use crate::storage::{MemoryStore, QueryMatch, StoreQuery, VectorRecord};

pub struct PineconeStore {
    client: reqwest::Client,
    host: String,
    api_key: String,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    filter: Value,
    namespace: &'a str,
    top_k: usize,
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

impl PineconeStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        if config.index_host.is_empty() {
            return Err(AppError::Config("Pinecone index host is not configured".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout.max(1)))
            .build()?;

        let host = if config.index_host.starts_with("http") {
            config.index_host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", config.index_host.trim_end_matches('/'))
        };

        Ok(Self {
            client,
            host,
            api_key: config.api_key.clone(),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::VectorStore(format!("Pinecone request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::VectorStore(format!(
                "Pinecone error {}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl MemoryStore for PineconeStore {
    async fn upsert(&self, records: Vec<VectorRecord>, namespace: &str) -> Result<()> {
        tracing::debug!("Upserting {} vectors into namespace {}", records.len(), namespace);

        self.post(
            "/vectors/upsert",
            &UpsertRequest {
                vectors: &records,
                namespace,
            },
        )
        .await?;

        Ok(())
    }

    async fn query(&self, query: StoreQuery, namespace: &str) -> Result<Vec<QueryMatch>> {
        let response = self
            .post(
                "/query",
                &QueryRequest {
                    vector: &query.vector,
                    filter: query.filter.to_json(),
                    namespace,
                    top_k: query.top_k,
                    include_metadata: query.include_metadata,
                },
            )
            .await?;

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to parse query response: {}", e)))?;

        Ok(body.matches)
    }
}
