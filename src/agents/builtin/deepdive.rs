use super::{complete_json, llm_estimate, search, truncate, RESEARCH_CALL_TOKENS};
use crate::agents::payload::{AgentPayload, DeepDiveOutput};
use crate::agents::{AgentContext, AgentError, AgentKind, ResearchAgent};
use crate::budget::{CostEstimate, CostMeter, PriceTable};
use crate::llm::LLMClient;
use crate::search::{ExtractResponse, SearchClient, SearchRequest};
use async_trait::async_trait;
use std::sync::Arc;

const MAX_PAGES: usize = 5;
const MAX_PAGE_CHARS: usize = 3_000;

/// Reads the company's own pages and extracts business-model detail
pub struct DeepDiveAgent {
    search: Arc<dyn SearchClient>,
    llm: Arc<dyn LLMClient>,
}

impl DeepDiveAgent {
    pub fn new(search: Arc<dyn SearchClient>, llm: Arc<dyn LLMClient>) -> Self {
        Self { search, llm }
    }

    /// About, product and team pages first, then whatever else discovery found
    fn pages(ctx: &AgentContext) -> Vec<String> {
        let Some(discovery) = ctx.prior.discovery.as_ref() else {
            return Vec::new();
        };
        let pages = &discovery.key_pages;
        let mut urls: Vec<String> = Vec::new();
        for url in pages
            .about
            .iter()
            .chain(&pages.products)
            .chain(&pages.team)
            .chain(&discovery.urls)
        {
            if urls.len() == MAX_PAGES {
                break;
            }
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }
        urls
    }

    fn fallback_request(ctx: &AgentContext) -> SearchRequest {
        SearchRequest::new(format!("\"{}\" business model products customers", ctx.company.name))
            .max_results(8)
    }
}

#[async_trait]
impl ResearchAgent for DeepDiveAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::DeepDive
    }

    fn estimate(&self, ctx: &AgentContext, prices: &PriceTable) -> CostEstimate {
        let pages = Self::pages(ctx);
        let credits = if pages.is_empty() {
            Self::fallback_request(ctx).credits()
        } else {
            ExtractResponse::max_credits(pages.len())
        };
        CostEstimate::search(credits).with_llm(llm_estimate(self.llm.as_ref(), prices, RESEARCH_CALL_TOKENS * 2))
    }

    async fn run(&self, ctx: &AgentContext, meter: &CostMeter) -> Result<AgentPayload, AgentError> {
        let pages = Self::pages(ctx);
        let mut sources = Vec::new();
        let mut content = String::new();

        if pages.is_empty() {
            let response = search(self.search.as_ref(), meter, &Self::fallback_request(ctx)).await?;
            for hit in response.results {
                content.push_str(&format!("## {}\n{}\n\n", hit.url, truncate(&hit.content, MAX_PAGE_CHARS)));
                sources.push(hit.url);
            }
        } else {
            let extracted = self.search.extract(&pages).await?;
            meter.record_search(extracted.credits());
            for page in extracted.results {
                content.push_str(&format!("## {}\n{}\n\n", page.url, truncate(&page.raw_content, MAX_PAGE_CHARS)));
                sources.push(page.url);
            }
        }

        if content.is_empty() {
            return Err(AgentError::InvalidOutput("no page content could be retrieved".to_string()));
        }

        let prompt = format!(
            "Analyse {company} from its own published content.\n\n{content}\n\
             Return JSON: {{\"mission_vision\": str, \"business_model\": str, \"product_offering\": str, \
             \"market_approach\": str, \"organization\": str, \"growth_indicators\": [str], \
             \"investment_insights\": [str], \"confidence\": number between 0 and 1}}",
            company = ctx.company_label(),
        );

        let mut output: DeepDiveOutput = complete_json(self.llm.as_ref(), meter, &prompt).await?;
        output.content_sources = sources;
        Ok(AgentPayload::DeepDive(output))
    }
}
