use crate::budget::TokenUsage;
use crate::llm::client::{LLMClient, LLMResponse};
use crate::types::{AppError, Result};
use crate::utils::toml_config::LlmProviderConfig;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Client for any OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAIClient {
    http_client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    json_mode: bool,
}

impl OpenAIClient {
    pub fn new(api_key: Option<String>, api_base: String, model: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model,
            temperature: 0.2,
            max_tokens: 4096,
            json_mode: true,
        }
    }

    /// Build a client from `[providers.llm]`, reading the key from the named
    /// environment variable. A missing key is reported on first use.
    pub fn from_config(config: &LlmProviderConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "LLM API key not set; LLM-backed agents will fail"
            );
        }
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            json_mode: config.json_mode,
            ..Self::new(api_key, config.base_url.clone(), config.model.clone())
        }
    }

    fn parse_response(&self, response_json: &Value) -> Result<LLMResponse> {
        let choice = response_json
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| AppError::LLM("No choices in completion response".to_string()))?;

        let content = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();

        let finish_reason = choice
            .get("finish_reason")
            .and_then(|f| f.as_str())
            .unwrap_or("stop")
            .to_string();

        let usage = response_json
            .get("usage")
            .map(|u| {
                TokenUsage::new(
                    u.get("prompt_tokens").and_then(|t| t.as_u64()).unwrap_or(0),
                    u.get("completion_tokens")
                        .and_then(|t| t.as_u64())
                        .unwrap_or(0),
                )
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content,
            usage,
            finish_reason,
        })
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<LLMResponse> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::Configuration("LLM API key is not configured".to_string())
        })?;

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        if self.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLM(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::upstream_status(status, &text, AppError::LLM));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| AppError::LLM(format!("Failed to parse response: {}", e)))?;

        self.parse_response(&response_json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_generate_parses_content_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "{\"ok\": true}"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 120, "completion_tokens": 30}
            })))
            .mount(&server)
            .await;

        let client = OpenAIClient::new(Some("sk-test".to_string()), server.uri(), "gpt-4o-mini".to_string());
        let response = client.generate_with_system("sys", "hello").await.unwrap();

        assert_eq!(response.content, "{\"ok\": true}");
        assert_eq!(response.usage, TokenUsage::new(120, 30));
        assert_eq!(response.finish_reason, "stop");
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = OpenAIClient::new(Some("sk-test".to_string()), server.uri(), "gpt-4o".to_string());
        let err = client.generate("hello").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let client = OpenAIClient::new(None, "http://127.0.0.1:9".to_string(), "gpt-4o".to_string());
        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
