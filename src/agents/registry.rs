//! Agent Registry
//!
//! Maps every [`AgentKind`] to the implementation that serves it. A registry
//! is only valid when all eight kinds are present, so the pipeline never has
//! to handle a missing agent at run time.

use super::builtin;
use super::{AgentKind, ResearchAgent};
use crate::llm::LLMClient;
use crate::search::SearchClient;
use crate::types::{AppError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of the agents that make up the pipeline
#[derive(Clone)]
pub struct AgentRegistry {
    agents: HashMap<AgentKind, Arc<dyn ResearchAgent>>,
}

impl AgentRegistry {
    /// Registry backed by the built-in search and LLM agents
    pub fn builtin(search: Arc<dyn SearchClient>, llm: Arc<dyn LLMClient>) -> Result<Self> {
        AgentRegistryBuilder::new()
            .with_agent(Arc::new(builtin::DiscoveryAgent::new(Arc::clone(&search))))
            .with_agent(Arc::new(builtin::NewsAgent::new(Arc::clone(&search))))
            .with_agent(Arc::new(builtin::PatentAgent::new(Arc::clone(&search))))
            .with_agent(Arc::new(builtin::FounderAgent::new(
                Arc::clone(&search),
                Arc::clone(&llm),
            )))
            .with_agent(Arc::new(builtin::CompetitiveAgent::new(
                Arc::clone(&search),
                Arc::clone(&llm),
            )))
            .with_agent(Arc::new(builtin::DeepDiveAgent::new(
                Arc::clone(&search),
                Arc::clone(&llm),
            )))
            .with_agent(Arc::new(builtin::VerificationAgent::new(Arc::clone(&llm))))
            .with_agent(Arc::new(builtin::SynthesisAgent::new(llm)))
            .build()
    }

    /// Get the agent serving `kind`
    pub fn get(&self, kind: AgentKind) -> Result<Arc<dyn ResearchAgent>> {
        self.agents
            .get(&kind)
            .cloned()
            .ok_or_else(|| AppError::Configuration(format!("No agent registered for '{}'", kind)))
    }

    pub fn has_agent(&self, kind: AgentKind) -> bool {
        self.agents.contains_key(&kind)
    }

    /// Registered kinds in pipeline order
    pub fn kinds(&self) -> Vec<AgentKind> {
        let mut kinds: Vec<AgentKind> = self.agents.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

/// Builder for creating AgentRegistry with fluent API
pub struct AgentRegistryBuilder {
    agents: HashMap<AgentKind, Arc<dyn ResearchAgent>>,
}

impl AgentRegistryBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }

    /// Register an agent under its own kind, replacing any earlier one
    pub fn with_agent(mut self, agent: Arc<dyn ResearchAgent>) -> Self {
        self.agents.insert(agent.kind(), agent);
        self
    }

    /// Build the AgentRegistry
    pub fn build(self) -> Result<AgentRegistry> {
        let missing: Vec<&str> = AgentKind::ALL
            .iter()
            .filter(|k| !self.agents.contains_key(*k))
            .map(|k| k.as_str())
            .collect();

        if !missing.is_empty() {
            return Err(AppError::Configuration(format!(
                "AgentRegistry is missing agents: {}",
                missing.join(", ")
            )));
        }

        Ok(AgentRegistry {
            agents: self.agents,
        })
    }
}

impl Default for AgentRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
