use super::{complete_json, llm_estimate, prompt_context, RESEARCH_CALL_TOKENS};
use crate::agents::payload::{
    AgentPayload, InsightDocument, SourceType, FUNDING_KEYWORDS, PARTNERSHIP_KEYWORDS,
};
use crate::agents::{AgentContext, AgentError, AgentKind, ResearchAgent};
use crate::budget::{CostEstimate, CostMeter, PriceTable};
use crate::llm::LLMClient;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const MAX_HEURISTIC_ITEMS: usize = 5;
const HEURISTIC_CONFIDENCE: f64 = 0.3;

/// Produces the final insight document
pub struct SynthesisAgent {
    llm: Arc<dyn LLMClient>,
}

impl SynthesisAgent {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }
}

/// Keyword-only dossier assembled without any model call
pub fn heuristic_insights(ctx: &AgentContext) -> InsightDocument {
    let prior = &ctx.prior;
    let sources = prior.news.as_ref().map(|n| n.sources.as_slice()).unwrap_or_default();

    let matching = |keywords: &[&str], tag: SourceType| -> Vec<String> {
        sources
            .iter()
            .filter(|s| {
                let text = format!("{} {}", s.title, s.snippet).to_lowercase();
                s.source_type == tag || keywords.iter().any(|k| text.contains(k))
            })
            .map(|s| s.title.clone())
            .take(MAX_HEURISTIC_ITEMS)
            .collect()
    };
    let funding_events = matching(FUNDING_KEYWORDS, SourceType::Funding);
    let partnerships = matching(PARTNERSHIP_KEYWORDS, SourceType::Partnership);

    let mut risk_assessment: Vec<String> = prior
        .verification
        .as_ref()
        .map(|v| v.red_flags.iter().chain(&v.inconsistencies).cloned().collect())
        .unwrap_or_default();
    risk_assessment.truncate(MAX_HEURISTIC_ITEMS);

    let mut investment_signals = Vec::new();
    if !funding_events.is_empty() {
        investment_signals.push(format!("{} recent funding-related reports", funding_events.len()));
    }
    if !partnerships.is_empty() {
        investment_signals.push(format!("{} partnership announcements", partnerships.len()));
    }
    if let Some(patents) = prior.patents.as_ref().filter(|p| !p.patents.is_empty()) {
        investment_signals.push(format!("{} patents on record", patents.patents.len()));
    }

    let mut summary_parts = Vec::new();
    if let Some(summary) = prior.discovery.as_ref().map(|d| d.summary.trim()).filter(|s| !s.is_empty()) {
        summary_parts.push(summary.to_string());
    }
    if let Some(summary) = prior.verification.as_ref().map(|v| v.summary.trim()).filter(|s| !s.is_empty()) {
        summary_parts.push(summary.to_string());
    }

    InsightDocument {
        executive_summary: summary_parts.join(" "),
        investment_signals,
        risk_assessment,
        funding_events,
        partnerships,
        market_positioning: prior
            .competitive
            .as_ref()
            .map(|c| c.market_positioning.clone())
            .unwrap_or_default(),
        confidence_score: HEURISTIC_CONFIDENCE,
        investment_recommendation: "Insufficient budget for full synthesis; review raw research before deciding."
            .to_string(),
        degraded: true,
    }
}

#[async_trait]
impl ResearchAgent for SynthesisAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Synthesis
    }

    fn estimate(&self, _ctx: &AgentContext, prices: &PriceTable) -> CostEstimate {
        CostEstimate::llm(llm_estimate(self.llm.as_ref(), prices, RESEARCH_CALL_TOKENS * 2))
    }

    async fn run(&self, ctx: &AgentContext, meter: &CostMeter) -> Result<AgentPayload, AgentError> {
        let prior = &ctx.prior;
        let research = json!({
            "discovery": prior.discovery,
            "verification": prior.verification,
            "news": prior.news,
            "patents": prior.patents,
            "founders": prior.founders,
            "competitive": prior.competitive,
            "deepdive": prior.deepdive,
        });

        let prompt = format!(
            "Write an investor-grade assessment of {company}. Weigh verified facts above unverified ones; \
             null sections were not available.\n\n\
             {research}\n\n\
             Return JSON: {{\"executive_summary\": str, \"investment_signals\": [str], \
             \"risk_assessment\": [str], \"funding_events\": [str], \"partnerships\": [str], \
             \"market_positioning\": str, \"confidence_score\": number between 0 and 1, \
             \"investment_recommendation\": str}}",
            company = ctx.company_label(),
            research = prompt_context(&research),
        );

        let mut output: InsightDocument = complete_json(self.llm.as_ref(), meter, &prompt).await?;
        output.degraded = false;
        Ok(AgentPayload::Synthesis(output))
    }

    fn fallback(&self, ctx: &AgentContext) -> Option<AgentPayload> {
        let document = heuristic_insights(ctx);
        document
            .is_minimum_viable()
            .then_some(AgentPayload::Synthesis(document))
    }
}
