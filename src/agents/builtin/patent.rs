use super::search;
use crate::agents::payload::{AgentPayload, PatentOutput, PatentRecord};
use crate::agents::{AgentContext, AgentError, AgentKind, ResearchAgent};
use crate::budget::{CostEstimate, CostMeter, PriceTable};
use crate::search::{SearchClient, SearchRequest};
use async_trait::async_trait;
use std::sync::Arc;

const PATENT_DOMAINS: &[&str] = &[
    "patents.google.com",
    "patents.justia.com",
    "freepatentsonline.com",
];

pub struct PatentAgent {
    search: Arc<dyn SearchClient>,
}

impl PatentAgent {
    pub fn new(search: Arc<dyn SearchClient>) -> Self {
        Self { search }
    }

    fn request(ctx: &AgentContext) -> SearchRequest {
        SearchRequest::new(format!("\"{}\" patent assignee", ctx.company.name))
            .include_domains(PATENT_DOMAINS.iter().copied())
            .max_results(10)
    }
}

/// Publication number from a patent URL, e.g. `US10123456B2`
fn patent_number(url: &str) -> Option<String> {
    url.trim_end_matches('/')
        .split('/')
        .rev()
        .find(|segment| {
            segment.len() > 4
                && segment.chars().take(2).all(|c| c.is_ascii_uppercase())
                && segment.chars().skip(2).any(|c| c.is_ascii_digit())
        })
        .map(str::to_string)
}

#[async_trait]
impl ResearchAgent for PatentAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Patent
    }

    fn estimate(&self, ctx: &AgentContext, _prices: &PriceTable) -> CostEstimate {
        CostEstimate::search(Self::request(ctx).credits())
    }

    async fn run(&self, ctx: &AgentContext, meter: &CostMeter) -> Result<AgentPayload, AgentError> {
        let response = search(self.search.as_ref(), meter, &Self::request(ctx)).await?;

        let patents = response
            .results
            .into_iter()
            .filter(|hit| !hit.title.trim().is_empty())
            .map(|hit| PatentRecord {
                patent_number: patent_number(&hit.url),
                title: hit.title,
                abstract_text: super::truncate(&hit.content, 800),
                assignee: ctx.company.name.clone(),
                filing_date: hit.published_date,
                url: Some(hit.url),
                ..Default::default()
            })
            .collect();

        Ok(AgentPayload::Patent(PatentOutput { patents }))
    }
}
