//! LLM Provider Clients
//!
//! - [`LLMClient`] - The trait every provider implements
//! - [`OpenAIClient`] - Any OpenAI-compatible chat completions endpoint
//!   (OpenAI, OpenRouter, Ollama's `/v1`, vLLM)

/// Core LLM client trait and response type.
pub mod client;
/// OpenAI-compatible HTTP client.
pub mod openai;

pub use client::{LLMClient, LLMResponse};
pub use openai::OpenAIClient;
