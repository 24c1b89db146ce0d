//! Web search abstraction
//!
//! Search is billed in credits: a basic query costs one, an advanced query
//! two, and page extraction one per five successfully extracted URLs.

use crate::types::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchTopic {
    #[default]
    General,
    News,
}

/// One search query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub depth: SearchDepth,
    pub topic: SearchTopic,
    pub max_results: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_domains: Vec<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            depth: SearchDepth::Basic,
            topic: SearchTopic::General,
            max_results: 10,
            include_domains: Vec::new(),
        }
    }

    pub fn depth(mut self, depth: SearchDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn topic(mut self, topic: SearchTopic) -> Self {
        self.topic = topic;
        self
    }

    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn include_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Credits this query is billed
    pub fn credits(&self) -> f64 {
        match self.depth {
            SearchDepth::Basic => 1.0,
            SearchDepth::Advanced => 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub url: String,
    #[serde(default)]
    pub raw_content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractResponse {
    #[serde(default)]
    pub results: Vec<ExtractedPage>,
    #[serde(default)]
    pub failed_results: Vec<serde_json::Value>,
}

impl ExtractResponse {
    /// One credit per five successful extractions, rounded up
    pub fn credits(&self) -> f64 {
        self.results.len().div_ceil(5) as f64
    }

    /// Credits a request for `url_count` URLs may be billed at most
    pub fn max_credits(url_count: usize) -> f64 {
        url_count.div_ceil(5) as f64
    }
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse>;

    async fn extract(&self, urls: &[String]) -> Result<ExtractResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_credits_by_depth() {
        assert_eq!(SearchRequest::new("acme").credits(), 1.0);
        assert_eq!(
            SearchRequest::new("acme").depth(SearchDepth::Advanced).credits(),
            2.0
        );
    }

    #[test]
    fn test_extract_credits_round_up() {
        let response = ExtractResponse {
            results: vec![ExtractedPage::default(); 6],
            failed_results: Vec::new(),
        };
        assert_eq!(response.credits(), 2.0);
        assert_eq!(ExtractResponse::max_credits(5), 1.0);
    }
}
