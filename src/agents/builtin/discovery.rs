use super::search;
use crate::agents::payload::{AgentPayload, DiscoveryOutput, KeyPages};
use crate::agents::{AgentContext, AgentError, AgentKind, ResearchAgent};
use crate::budget::{CostEstimate, CostMeter, PriceTable};
use crate::search::{SearchClient, SearchRequest};
use async_trait::async_trait;
use std::sync::Arc;

const LEGAL_SUFFIXES: &[&str] = &[
    " inc", " inc.", " ltd", " ltd.", " llc", " corp", " corp.", " corporation", " gmbh", " co.",
    " limited", " plc",
];

/// Maps the company's web presence and establishes context for the research phase
pub struct DiscoveryAgent {
    search: Arc<dyn SearchClient>,
}

impl DiscoveryAgent {
    pub fn new(search: Arc<dyn SearchClient>) -> Self {
        Self { search }
    }

    fn requests(ctx: &AgentContext) -> Vec<SearchRequest> {
        let name = &ctx.company.name;
        let mut requests = vec![SearchRequest::new(format!("\"{}\" company overview", name)).max_results(10)];
        if let Some(domain) = &ctx.company.domain {
            requests.push(
                SearchRequest::new(format!("{} site pages", name))
                    .include_domains([domain.clone()])
                    .max_results(20),
            );
        }
        requests
    }
}

/// Name variants the company is likely to appear under
fn aliases(name: &str, domain: Option<&str>) -> Vec<String> {
    let mut aliases = Vec::new();
    let lower = name.to_lowercase();
    if let Some(suffix) = LEGAL_SUFFIXES.iter().find(|s| lower.ends_with(*s)) {
        let base = name
            .len()
            .checked_sub(suffix.len())
            .and_then(|end| name.get(..end))
            .map(|b| b.trim_end_matches(',').trim())
            .unwrap_or_default();
        if !base.is_empty() {
            aliases.push(base.to_string());
        }
    }
    if let Some(stem) = domain.and_then(|d| d.split('.').next()) {
        if !stem.is_empty() && !stem.eq_ignore_ascii_case(name) && !aliases.iter().any(|a| a.eq_ignore_ascii_case(stem)) {
            aliases.push(stem.to_string());
        }
    }
    aliases
}

#[async_trait]
impl ResearchAgent for DiscoveryAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Discovery
    }

    fn estimate(&self, ctx: &AgentContext, _prices: &PriceTable) -> CostEstimate {
        CostEstimate::search(Self::requests(ctx).iter().map(SearchRequest::credits).sum())
    }

    async fn run(&self, ctx: &AgentContext, meter: &CostMeter) -> Result<AgentPayload, AgentError> {
        let domain = ctx.company.domain.as_deref();
        let mut output = DiscoveryOutput {
            aliases: aliases(&ctx.company.name, domain),
            ..Default::default()
        };

        let mut on_domain = false;
        for request in Self::requests(ctx) {
            let response = search(self.search.as_ref(), meter, &request).await?;

            if output.summary.is_empty() {
                output.summary = response
                    .answer
                    .clone()
                    .or_else(|| response.results.first().map(|h| h.content.clone()))
                    .unwrap_or_default();
            }
            for hit in response.results {
                if output.urls.contains(&hit.url) {
                    continue;
                }
                if domain.is_some_and(|d| hit.url.contains(d)) {
                    on_domain = true;
                }
                if output.insights.len() < 3 && !hit.title.is_empty() {
                    output.insights.push(hit.title.clone());
                }
                output.urls.push(hit.url);
            }
        }

        let mut key_pages = KeyPages::default();
        for url in &output.urls {
            key_pages.classify(url);
        }
        output.key_pages = key_pages;

        output.confidence = match (on_domain, output.urls.is_empty()) {
            (true, _) => 0.9,
            (false, false) => 0.6,
            (false, true) => 0.2,
        };

        if !output.is_usable() {
            return Err(AgentError::Unusable(format!(
                "no web presence found for {}",
                ctx.company_label()
            )));
        }

        tracing::info!(urls = output.urls.len(), confidence = output.confidence, "Discovery mapped company");
        Ok(AgentPayload::Discovery(output))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fakes::{ctx, hit, meter, FakeSearch};
    use super::*;
    use crate::agents::ErrorClass;
    use crate::types::AppError;

    #[tokio::test]
    async fn test_empty_search_is_unusable() {
        let search = Arc::new(FakeSearch::new());
        let agent = DiscoveryAgent::new(search.clone());
        let (ledger, meter) = meter();

        let err = agent
            .run(&ctx("Nowhere Labs", Some("nowhere.example")), &meter)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Unusable(ref msg) if msg.contains("Nowhere Labs")));
        assert_eq!(err.class(), ErrorClass::Fatal);
        // Both lookups ran and were billed before giving up
        assert_eq!(search.requests.lock().len(), 2);
        assert_eq!(ledger.snapshot().search_credits, 2.0);
    }

    #[tokio::test]
    async fn test_on_domain_hits_map_key_pages() {
        let search = Arc::new(
            FakeSearch::new()
                .respond(vec![hit("Acme raises seed", "https://news.example/acme", "Acme builds anvils")])
                .respond(vec![
                    hit("About Acme", "https://acme.com/about", "Our story"),
                    hit("Team", "https://acme.com/team", "People"),
                    hit("Acme raises seed", "https://news.example/acme", "dup"),
                ]),
        );
        let agent = DiscoveryAgent::new(search.clone());
        let (_ledger, meter) = meter();

        let payload = agent.run(&ctx("Acme Inc.", Some("acme.com")), &meter).await.unwrap();
        let AgentPayload::Discovery(output) = payload else {
            panic!("expected discovery payload");
        };

        assert_eq!(output.urls.len(), 3);
        assert_eq!(output.key_pages.about, vec!["https://acme.com/about"]);
        assert_eq!(output.key_pages.team, vec!["https://acme.com/team"]);
        assert_eq!(output.confidence, 0.9);
        assert_eq!(output.summary, "Acme builds anvils");
        assert_eq!(output.aliases, vec!["Acme"]);
        assert_eq!(search.requests.lock()[1].include_domains, vec!["acme.com"]);
    }

    #[tokio::test]
    async fn test_off_domain_hits_lower_confidence() {
        let search = Arc::new(FakeSearch::new().respond(vec![hit("Globex", "https://wiki.example/globex", "A company")]));
        let agent = DiscoveryAgent::new(search);
        let (_ledger, meter) = meter();

        let payload = agent.run(&ctx("Globex", None), &meter).await.unwrap();
        let AgentPayload::Discovery(output) = payload else {
            panic!("expected discovery payload");
        };
        assert_eq!(output.confidence, 0.6);
    }

    #[tokio::test]
    async fn test_search_outage_is_transient() {
        let search = Arc::new(FakeSearch::new().fail(AppError::Search("503 from provider".to_string())));
        let agent = DiscoveryAgent::new(search);
        let (ledger, meter) = meter();

        let err = agent.run(&ctx("Acme", None), &meter).await.unwrap_err();

        assert_eq!(err.class(), ErrorClass::Transient);
        assert_eq!(ledger.snapshot().search_credits, 0.0);
    }

    #[test]
    fn test_estimate_counts_domain_lookup() {
        let prices = PriceTable::default();
        let agent = DiscoveryAgent::new(Arc::new(FakeSearch::new()));
        assert_eq!(agent.estimate(&ctx("Acme", None), &prices).search_credits, 1.0);
        assert_eq!(agent.estimate(&ctx("Acme", Some("acme.com")), &prices).search_credits, 2.0);
    }

    #[test]
    fn test_aliases_strip_legal_suffix_and_use_domain_stem() {
        assert_eq!(aliases("Acme Inc.", Some("acmecorp.com")), vec!["Acme", "acmecorp"]);
        assert_eq!(aliases("Globex", Some("globex.io")), Vec::<String>::new());
        assert!(aliases("Initech", None).is_empty());
    }
}
