use super::{complete_json, llm_estimate, render_hits, search, RESEARCH_CALL_TOKENS};
use crate::agents::payload::{AgentPayload, CompetitiveOutput};
use crate::agents::{AgentContext, AgentError, AgentKind, ResearchAgent};
use crate::budget::{CostEstimate, CostMeter, PriceTable};
use crate::llm::LLMClient;
use crate::search::{SearchClient, SearchRequest};
use async_trait::async_trait;
use std::sync::Arc;

pub struct CompetitiveAgent {
    search: Arc<dyn SearchClient>,
    llm: Arc<dyn LLMClient>,
}

impl CompetitiveAgent {
    pub fn new(search: Arc<dyn SearchClient>, llm: Arc<dyn LLMClient>) -> Self {
        Self { search, llm }
    }

    fn request(ctx: &AgentContext) -> SearchRequest {
        SearchRequest::new(format!("\"{}\" competitors alternatives market landscape", ctx.company.name))
            .max_results(10)
    }
}

#[async_trait]
impl ResearchAgent for CompetitiveAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Competitive
    }

    fn estimate(&self, ctx: &AgentContext, prices: &PriceTable) -> CostEstimate {
        CostEstimate::search(Self::request(ctx).credits())
            .with_llm(llm_estimate(self.llm.as_ref(), prices, RESEARCH_CALL_TOKENS))
    }

    async fn run(&self, ctx: &AgentContext, meter: &CostMeter) -> Result<AgentPayload, AgentError> {
        let response = search(self.search.as_ref(), meter, &Self::request(ctx)).await?;
        let overview = ctx
            .prior
            .discovery
            .as_ref()
            .map(|d| d.summary.as_str())
            .unwrap_or_default();

        let prompt = format!(
            "Map the competitive landscape of {company}.\n\
             Company overview: {overview}\n\n\
             Search results:\n{hits}\n\
             Return JSON: {{\"competitors\": [{{\"name\": str, \"category\": \"direct\"|\"indirect\", \
             \"description\": str, \"strengths\": [str], \"market_position\": str, \"funding_status\": str}}], \
             \"market_positioning\": str, \"competitive_advantages\": [str], \"threats\": [str], \
             \"opportunities\": [str], \"investment_implications\": str}}",
            company = ctx.company_label(),
            hits = render_hits(&response),
        );

        let output: CompetitiveOutput = complete_json(self.llm.as_ref(), meter, &prompt).await?;
        Ok(AgentPayload::Competitive(output))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fakes::{ctx, hit, meter, FakeLlm, FakeSearch};
    use super::*;
    use crate::agents::payload::DiscoveryOutput;

    #[tokio::test]
    async fn test_landscape_from_search_and_overview() {
        let search = Arc::new(FakeSearch::new().respond(vec![hit(
            "Top anvil makers",
            "https://market.example/anvils",
            "Acme vs Ajax",
        )]));
        let llm = Arc::new(FakeLlm::replying(
            r#"Here you go: {"competitors": [{"name": "Ajax", "category": "direct"}], "market_positioning": "Premium"}"#,
        ));
        let agent = CompetitiveAgent::new(search, llm.clone());
        let mut ctx = ctx("Acme", Some("acme.com"));
        ctx.prior.discovery = Some(DiscoveryOutput {
            summary: "Acme makes anvils".to_string(),
            ..Default::default()
        });
        let (_ledger, meter) = meter();

        let payload = agent.run(&ctx, &meter).await.unwrap();
        let AgentPayload::Competitive(output) = payload else {
            panic!("expected competitive payload");
        };

        assert_eq!(output.competitors[0].name, "Ajax");
        assert_eq!(output.market_positioning, "Premium");
        let prompt = llm.prompts.lock()[0].clone();
        assert!(prompt.contains("Acme (acme.com)"));
        assert!(prompt.contains("Company overview: Acme makes anvils"));
    }

    #[test]
    fn test_estimate_covers_search_and_model() {
        let agent = CompetitiveAgent::new(Arc::new(FakeSearch::new()), Arc::new(FakeLlm::replying("{}")));
        let estimate = agent.estimate(&ctx("Acme", None), &PriceTable::default());
        assert_eq!(estimate.search_credits, 1.0);
        assert!(estimate.llm_usd > 0.0);
    }
}
