use super::{complete_json, llm_estimate, prompt_context, RESEARCH_CALL_TOKENS};
use crate::agents::payload::{AgentPayload, VerificationOutput};
use crate::agents::{AgentContext, AgentError, AgentKind, ResearchAgent};
use crate::budget::{CostEstimate, CostMeter, PriceTable};
use crate::llm::LLMClient;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Cross-checks claims made across the research outputs
pub struct VerificationAgent {
    llm: Arc<dyn LLMClient>,
}

impl VerificationAgent {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ResearchAgent for VerificationAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Verification
    }

    fn estimate(&self, _ctx: &AgentContext, prices: &PriceTable) -> CostEstimate {
        CostEstimate::llm(llm_estimate(self.llm.as_ref(), prices, RESEARCH_CALL_TOKENS * 2))
    }

    async fn run(&self, ctx: &AgentContext, meter: &CostMeter) -> Result<AgentPayload, AgentError> {
        let prior = &ctx.prior;
        let evidence = json!({
            "discovery": prior.discovery,
            "news": prior.news,
            "patents": prior.patents,
            "founders": prior.founders,
            "competitive": prior.competitive,
            "deepdive": prior.deepdive,
        });

        let prompt = format!(
            "Cross-validate the research gathered on {company}. Null sections were not available.\n\n\
             {evidence}\n\n\
             Return JSON: {{\"verified_facts\": [{{\"claim\": str, \
             \"status\": \"verified\"|\"partially_verified\"|\"unverified\"|\"contradicted\", \
             \"confidence\": number between 0 and 1, \"sources\": [str], \"notes\": str}}], \
             \"inconsistencies\": [str], \"information_gaps\": [str], \"red_flags\": [str], \
             \"reliability_score\": number between 0 and 1, \"summary\": str}}",
            company = ctx.company_label(),
            evidence = prompt_context(&evidence),
        );

        let output: VerificationOutput = complete_json(self.llm.as_ref(), meter, &prompt).await?;
        Ok(AgentPayload::Verification(output))
    }
}
