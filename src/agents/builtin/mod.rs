//! Built-in agents
//!
//! Thin implementations of each research capability over a search client
//! and an LLM client. They exist so the server is usable out of the box;
//! deployments that need better research swap individual agents through
//! [`AgentRegistryBuilder`](super::AgentRegistryBuilder).

mod competitive;
mod deepdive;
mod discovery;
#[cfg(test)]
mod fakes;
mod founder;
mod news;
mod patent;
mod synthesis;
mod verification;

pub use competitive::CompetitiveAgent;
pub use deepdive::DeepDiveAgent;
pub use discovery::DiscoveryAgent;
pub use founder::FounderAgent;
pub use news::NewsAgent;
pub use patent::PatentAgent;
pub use synthesis::{heuristic_insights, SynthesisAgent};
pub use verification::VerificationAgent;

use super::AgentError;
use crate::budget::{CostMeter, PriceTable};
use crate::llm::LLMClient;
use crate::search::{SearchClient, SearchRequest, SearchResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Tokens assumed for one research-sized LLM call when estimating cost
const RESEARCH_CALL_TOKENS: u64 = 6_000;

/// Longest serialized context passed into a prompt
const MAX_CONTEXT_CHARS: usize = 12_000;

const JSON_SYSTEM_PROMPT: &str = "You are an investment research analyst. \
Respond with a single JSON object matching the requested schema and nothing else.";

/// Run a search and bill its credits
async fn search(
    client: &dyn SearchClient,
    meter: &CostMeter,
    request: &SearchRequest,
) -> Result<SearchResponse, AgentError> {
    let response = client.search(request).await?;
    meter.record_search(request.credits());
    Ok(response)
}

/// Ask the model for JSON, bill the tokens, and parse into `T`
async fn complete_json<T: DeserializeOwned>(
    llm: &dyn LLMClient,
    meter: &CostMeter,
    prompt: &str,
) -> Result<T, AgentError> {
    let response = llm.generate_with_system(JSON_SYSTEM_PROMPT, prompt).await?;
    meter.record_llm(llm.model_name(), response.usage);

    let body = response
        .json_body()
        .ok_or_else(|| AgentError::InvalidOutput("model returned no JSON object".to_string()))?;
    serde_json::from_str(body)
        .map_err(|e| AgentError::InvalidOutput(format!("model output did not match schema: {}", e)))
}

fn llm_estimate(llm: &dyn LLMClient, prices: &PriceTable, tokens: u64) -> f64 {
    prices.estimate(llm.model_name(), tokens)
}

/// Compact JSON of `value`, cut to the prompt context limit
fn prompt_context<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_string(value).unwrap_or_default();
    truncate(&json, MAX_CONTEXT_CHARS)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Search results rendered as numbered prompt lines
fn render_hits(response: &SearchResponse) -> String {
    let mut out = String::new();
    if let Some(answer) = &response.answer {
        out.push_str(&format!("Summary: {}\n", answer));
    }
    for (i, hit) in response.results.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} ({})\n   {}\n",
            i + 1,
            hit.title,
            hit.url,
            truncate(&hit.content, 500)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::fakes::{meter, FakeLlm};
    use super::*;
    use crate::agents::payload::FounderOutput;
    use crate::agents::ErrorClass;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("hi", 5), "hi");
    }

    #[tokio::test]
    async fn test_complete_json_parses_fenced_object() {
        let llm = FakeLlm::replying("```json\n{\"founders\": [{\"name\": \"Ada\"}]}\n```");
        let (ledger, meter) = meter();

        let output: FounderOutput = complete_json(&llm, &meter, "who founded it").await.unwrap();

        assert_eq!(output.founders[0].name, "Ada");
        assert_eq!(meter.cost().tokens(), 1_200);
        assert!(ledger.snapshot().llm_usd > 0.0);
    }

    #[tokio::test]
    async fn test_complete_json_rejects_prose() {
        let llm = FakeLlm::replying("I could not find anything about this company.");
        let (_ledger, meter) = meter();

        let err = complete_json::<FounderOutput>(&llm, &meter, "who founded it")
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::InvalidOutput(_)));
        assert_eq!(err.class(), ErrorClass::Validation);
    }

    #[tokio::test]
    async fn test_complete_json_schema_mismatch_is_validation_and_still_billed() {
        let llm = FakeLlm::replying("{\"founders\": \"Ada Lovelace\"}");
        let (ledger, meter) = meter();

        let err = complete_json::<FounderOutput>(&llm, &meter, "who founded it")
            .await
            .unwrap_err();

        assert_eq!(err.class(), ErrorClass::Validation);
        assert!(err.to_string().contains("schema"));
        assert_eq!(ledger.snapshot().llm_tokens, 1_200);
    }

    #[test]
    fn test_render_hits_numbers_results_after_summary() {
        let response = SearchResponse {
            answer: Some("Acme makes anvils".to_string()),
            results: vec![
                super::fakes::hit("Acme", "https://acme.com", "Anvils"),
                super::fakes::hit("Acme blog", "https://acme.com/blog", "Posts"),
            ],
        };
        let rendered = render_hits(&response);
        assert!(rendered.starts_with("Summary: Acme makes anvils\n"));
        assert!(rendered.contains("1. Acme (https://acme.com)"));
        assert!(rendered.contains("2. Acme blog (https://acme.com/blog)"));
    }
}
