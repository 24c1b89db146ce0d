use super::search;
use crate::agents::payload::{AgentPayload, NewsOutput, Source, SourceType};
use crate::agents::{AgentContext, AgentError, AgentKind, ResearchAgent};
use crate::budget::{CostEstimate, CostMeter, PriceTable};
use crate::search::{SearchClient, SearchRequest, SearchTopic};
use async_trait::async_trait;
use std::sync::Arc;

/// Recent press coverage, typed by what the story is about
pub struct NewsAgent {
    search: Arc<dyn SearchClient>,
}

impl NewsAgent {
    pub fn new(search: Arc<dyn SearchClient>) -> Self {
        Self { search }
    }

    fn request(ctx: &AgentContext) -> SearchRequest {
        let mut query = format!("\"{}\" news funding partnership", ctx.company.name);
        if let Some(alias) = ctx.prior.discovery.as_ref().and_then(|d| d.aliases.first()) {
            query.push_str(&format!(" OR \"{}\"", alias));
        }
        SearchRequest::new(query).topic(SearchTopic::News).max_results(15)
    }
}

#[async_trait]
impl ResearchAgent for NewsAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::News
    }

    fn estimate(&self, ctx: &AgentContext, _prices: &PriceTable) -> CostEstimate {
        CostEstimate::search(Self::request(ctx).credits())
    }

    async fn run(&self, ctx: &AgentContext, meter: &CostMeter) -> Result<AgentPayload, AgentError> {
        let response = search(self.search.as_ref(), meter, &Self::request(ctx)).await?;

        let sources = response
            .results
            .into_iter()
            .map(|hit| Source {
                source_type: SourceType::classify(&format!("{} {}", hit.title, hit.content)),
                title: hit.title,
                url: hit.url,
                snippet: super::truncate(&hit.content, 400),
                published_date: hit.published_date,
                relevance: hit.score,
            })
            .collect();

        Ok(AgentPayload::News(NewsOutput { sources }))
    }
}
