use crate::search::client::{ExtractResponse, SearchClient, SearchRequest, SearchResponse};
use crate::types::{AppError, Result};
use crate::utils::toml_config::SearchProviderConfig;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Tavily-compatible search and extract client
pub struct TavilyClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl TavilyClient {
    pub fn new(api_key: Option<String>, base_url: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &SearchProviderConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "Search API key not set; search-backed agents will fail"
            );
        }
        Self::new(api_key, config.base_url.clone())
    }

    async fn post<T: DeserializeOwned>(&self, endpoint: &str, mut body: Value) -> Result<T> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::Configuration("Search API key is not configured".to_string())
        })?;
        body["api_key"] = json!(api_key);

        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Search(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::upstream_status(status, &text, AppError::Search));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Search(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let mut body = json!({
            "query": request.query,
            "search_depth": request.depth,
            "topic": request.topic,
            "max_results": request.max_results,
            "include_answer": true,
        });
        if !request.include_domains.is_empty() {
            body["include_domains"] = json!(request.include_domains);
        }

        let response: SearchResponse = self.post("search", body).await?;
        tracing::debug!(
            query = %request.query,
            results = response.results.len(),
            "Search completed"
        );
        Ok(response)
    }

    async fn extract(&self, urls: &[String]) -> Result<ExtractResponse> {
        if urls.is_empty() {
            return Ok(ExtractResponse::default());
        }
        self.post("extract", json!({ "urls": urls })).await
    }
}
