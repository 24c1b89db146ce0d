//! LLM client abstraction
//!
//! Agents talk to the language model through [`LLMClient`] so the provider
//! can be swapped (or mocked in tests) without touching agent code. Every
//! response carries the provider-reported token usage, which the cost meter
//! turns into USD.

use crate::budget::TokenUsage;
use crate::types::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Generic LLM client trait for provider abstraction
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate with a system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<LLMResponse>;

    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<LLMResponse> {
        self.generate_with_system("", prompt).await
    }

    /// Get the model name/identifier, used to look up token prices
    fn model_name(&self) -> &str;
}

/// Response from an LLM generation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LLMResponse {
    /// The text content of the response
    pub content: String,
    /// Tokens billed for the call
    pub usage: TokenUsage,
    /// The reason generation stopped (e.g., "stop", "length")
    pub finish_reason: String,
}

impl LLMResponse {
    /// The first JSON object embedded in the content.
    ///
    /// Models frequently wrap JSON in a markdown fence or a sentence of prose;
    /// this strips everything outside the outermost braces.
    pub fn json_body(&self) -> Option<&str> {
        let start = self.content.find('{')?;
        let end = self.content.rfind('}')?;
        (end > start).then(|| &self.content[start..=end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_body_strips_fences() {
        let response = LLMResponse {
            content: "```json\n{\"a\": {\"b\": 1}}\n```".to_string(),
            ..Default::default()
        };
        assert_eq!(response.json_body(), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn test_json_body_missing() {
        let response = LLMResponse {
            content: "no json here".to_string(),
            ..Default::default()
        };
        assert_eq!(response.json_body(), None);
    }
}
