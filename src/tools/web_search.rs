//! 网络搜索

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::config::SearchConfig;
use crate::error::{AppError, Result};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// 搜索并返回文本片段
    async fn search(&self, query: &str) -> Result<Vec<String>>;
}

/// Tavily 搜索客户端
pub struct TavilySearch {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilyResult {
    fn snippet(&self) -> String {
        format!("{}: {} ({})", self.title, self.content, self.url)
    }
}

impl TavilySearch {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout.max(1)))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_results: config.max_results,
        })
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        if self.api_key.is_empty() {
            return Err(AppError::WebSearch("Tavily API key is not configured".into()));
        }

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&serde_json::json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": self.max_results,
            }))
            .send()
            .await
            .map_err(|e| AppError::WebSearch(format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::WebSearch(format!(
                "Tavily returned {}: {}",
                status, error_text
            )));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| AppError::WebSearch(format!("Malformed search response: {}", e)))?;

        tracing::debug!("Web search returned {} results", body.results.len());

        Ok(body
            .results
            .iter()
            .take(self.max_results)
            .map(TavilyResult::snippet)
            .collect())
    }
}

/// 未配置搜索服务时使用
pub struct DisabledWebSearch;

#[async_trait]
impl WebSearch for DisabledWebSearch {
    async fn search(&self, _query: &str) -> Result<Vec<String>> {
        Err(AppError::WebSearch("Web search is not configured".into()))
    }
}

/// 按配置创建搜索客户端，没有密钥时返回禁用实现
pub fn create_web_search(config: &SearchConfig) -> Result<Box<dyn WebSearch>> {
    if config.api_key.is_empty() {
        tracing::warn!("TAVILY_API_KEY not set, web search disabled");
        return Ok(Box::new(DisabledWebSearch));
    }
    Ok(Box::new(TavilySearch::new(config)?))
}
