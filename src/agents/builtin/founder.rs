use super::{complete_json, llm_estimate, render_hits, search, RESEARCH_CALL_TOKENS};
use crate::agents::payload::{AgentPayload, FounderOutput};
use crate::agents::{AgentContext, AgentError, AgentKind, ResearchAgent};
use crate::budget::{CostEstimate, CostMeter, PriceTable};
use crate::llm::LLMClient;
use crate::search::{SearchClient, SearchDepth, SearchRequest};
use async_trait::async_trait;
use std::sync::Arc;

/// Founder and leadership profiles
pub struct FounderAgent {
    search: Arc<dyn SearchClient>,
    llm: Arc<dyn LLMClient>,
}

impl FounderAgent {
    pub fn new(search: Arc<dyn SearchClient>, llm: Arc<dyn LLMClient>) -> Self {
        Self { search, llm }
    }

    fn request(ctx: &AgentContext) -> SearchRequest {
        SearchRequest::new(format!("\"{}\" founder CEO co-founder background", ctx.company.name))
            .depth(SearchDepth::Advanced)
            .max_results(8)
    }
}

#[async_trait]
impl ResearchAgent for FounderAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Founder
    }

    fn estimate(&self, ctx: &AgentContext, prices: &PriceTable) -> CostEstimate {
        CostEstimate::search(Self::request(ctx).credits())
            .with_llm(llm_estimate(self.llm.as_ref(), prices, RESEARCH_CALL_TOKENS))
    }

    async fn run(&self, ctx: &AgentContext, meter: &CostMeter) -> Result<AgentPayload, AgentError> {
        let response = search(self.search.as_ref(), meter, &Self::request(ctx)).await?;
        let team_pages = ctx
            .prior
            .discovery
            .as_ref()
            .map(|d| d.key_pages.team.join(", "))
            .unwrap_or_default();

        let prompt = format!(
            "Identify the founders and key executives of {company}.\n\
             Known team pages: {team_pages}\n\n\
             Search results:\n{hits}\n\
             Return JSON: {{\"founders\": [{{\"name\": str, \"role\": str, \"background_summary\": str, \
             \"previous_experience\": [str], \"key_achievements\": [str], \"education\": [str], \
             \"investment_assessment\": str}}]}}",
            company = ctx.company_label(),
            hits = render_hits(&response),
        );

        let output: FounderOutput = complete_json(self.llm.as_ref(), meter, &prompt).await?;
        Ok(AgentPayload::Founder(output))
    }
}
