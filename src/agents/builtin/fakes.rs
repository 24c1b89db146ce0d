//! Scripted search and model clients for the built-in agent tests

use crate::agents::AgentContext;
use crate::budget::{BudgetCaps, CostLedger, CostMeter, OperationLabel, PriceTable, TokenUsage};
use crate::llm::{LLMClient, LLMResponse};
use crate::search::{
    ExtractResponse, ExtractedPage, SearchClient, SearchHit, SearchRequest, SearchResponse,
};
use crate::types::{Company, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

pub const MODEL: &str = "gpt-4o-mini";

pub fn hit(title: &str, url: &str, content: &str) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        url: url.to_string(),
        content: content.to_string(),
        score: 0.5,
        published_date: None,
    }
}

pub fn ctx(name: &str, domain: Option<&str>) -> AgentContext {
    AgentContext::new("run-1", Company::new(name, domain.map(str::to_string)))
}

/// A meter on a fresh ledger with default caps
pub fn meter() -> (Arc<CostLedger>, CostMeter) {
    let ledger = Arc::new(CostLedger::new(BudgetCaps::default()));
    let meter = CostMeter::new(
        Arc::clone(&ledger),
        Arc::new(PriceTable::default()),
        OperationLabel::default(),
    );
    (ledger, meter)
}

/// Answers searches from a queue, then with empty responses
#[derive(Default)]
pub struct FakeSearch {
    responses: Mutex<VecDeque<Result<SearchResponse>>>,
    pages: Mutex<Vec<ExtractedPage>>,
    pub requests: Mutex<Vec<SearchRequest>>,
    pub extracted: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, hits: Vec<SearchHit>) -> Self {
        self.responses.lock().push_back(Ok(SearchResponse {
            answer: None,
            results: hits,
        }));
        self
    }

    pub fn fail(self, error: crate::types::AppError) -> Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    pub fn page(self, url: &str, content: &str) -> Self {
        self.pages.lock().push(ExtractedPage {
            url: url.to_string(),
            raw_content: content.to_string(),
        });
        self
    }
}

#[async_trait]
impl SearchClient for FakeSearch {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(SearchResponse::default()))
    }

    async fn extract(&self, urls: &[String]) -> Result<ExtractResponse> {
        self.extracted.lock().extend(urls.iter().cloned());
        Ok(ExtractResponse {
            results: self.pages.lock().clone(),
            failed_results: Vec::new(),
        })
    }
}

/// Returns the same completion for every prompt and keeps the prompts
pub struct FakeLlm {
    content: String,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn replying(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl LLMClient for FakeLlm {
    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<LLMResponse> {
        self.prompts.lock().push(prompt.to_string());
        Ok(LLMResponse {
            content: self.content.clone(),
            usage: TokenUsage::new(1_000, 200),
            finish_reason: "stop".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        MODEL
    }
}
