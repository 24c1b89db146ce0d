//! # Compass - budgeted company research runs
//!
//! Compass turns a company name (and optionally its domain) into an
//! investor-grade intelligence dossier. Each request becomes a *run* that
//! moves through four phases:
//!
//! 1. **Discovery** - establish who the company is and where it lives online
//! 2. **Research** - news, patents, founders, competitors and a website deep
//!    dive, all in parallel
//! 3. **Verification** - cross-check what research found
//! 4. **Synthesis** - write the final insight document
//!
//! Every billable call is admitted against a process-wide [`CostLedger`]
//! that tracks search credits and LLM spend separately. Runs live in a
//! [`RunStore`] that clients poll while the phases execute in the background.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use compass::{AgentRegistry, AppState, ConfigManager, RunRequest};
//! use std::sync::Arc;
//!
//! let config_manager = Arc::new(ConfigManager::new("compass.toml")?);
//! let state = AppState::from_config(config_manager)?;
//!
//! let created = state.orchestrator.start_run(
//!     RunRequest { company: "Acme".into(), domain: Some("acme.com".into()) }.into_company()?,
//! )?;
//! let run = state.store.get(&created.run_id)?;
//! ```
//!
//! ## Modules
//!
//! - [`agents`] - Agent contract, adapter, registry and built-in agents
//! - [`api`] - REST API handlers and routes
//! - [`budget`] - Cost ledger, per-invocation meter and price table
//! - [`llm`] / [`search`] - Upstream provider clients
//! - [`pipeline`] - Orchestrator and phase scheduler
//! - [`runs`] - Run document and run state store
//! - [`types`] - Common types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Research agents and the adapter that invokes them.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// Cost ledger and pricing.
pub mod budget;
/// Command-line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Orchestrator and phase scheduler.
pub mod pipeline;
/// Run documents and their store.
pub mod runs;
/// Web search provider clients.
pub mod search;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use agents::{AgentRegistry, AgentRegistryBuilder, ResearchAgent};
pub use budget::CostLedger;
pub use llm::{LLMClient, LLMResponse, OpenAIClient};
pub use pipeline::Orchestrator;
pub use runs::{Run, RunStatus, RunStore};
pub use search::{SearchClient, TavilyClient};
pub use types::{AppError, Company, Result, RunRequest};
pub use utils::toml_config::{CompassConfig, ConfigManager};

use crate::agents::AgentAdapter;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration with hot-reload support
    pub config_manager: Arc<ConfigManager>,
    /// Process-wide budget ledger
    pub ledger: Arc<CostLedger>,
    /// Every run this process has started
    pub store: Arc<RunStore>,
    /// Agents available to the pipeline
    pub registry: Arc<AgentRegistry>,
    /// Starts and cancels runs
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Wire the engine around an existing agent registry
    pub fn new(config_manager: Arc<ConfigManager>, registry: AgentRegistry) -> Self {
        let config = config_manager.config();
        let caps = config.budget_caps();

        let ledger = Arc::new(CostLedger::with_settings(
            caps,
            config.health_thresholds(),
            config.budget.recent_operations,
        ));
        let store = Arc::new(RunStore::with_retention(caps, config.pipeline.max_finished_runs));
        let registry = Arc::new(registry);
        let adapter = Arc::new(AgentAdapter::new(
            Arc::clone(&ledger),
            Arc::new(config.price_table()),
            config.adapter_policy(),
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            adapter,
            config.cache_ttl(),
        ));

        Self {
            config_manager,
            ledger,
            store,
            registry,
            orchestrator,
        }
    }

    /// Wire the engine with the built-in agents and the configured providers
    pub fn from_config(config_manager: Arc<ConfigManager>) -> Result<Self> {
        let config = config_manager.config();
        let search: Arc<dyn SearchClient> =
            Arc::new(TavilyClient::from_config(&config.providers.search));
        let llm: Arc<dyn LLMClient> = Arc::new(OpenAIClient::from_config(&config.providers.llm));
        let registry = AgentRegistry::builtin(search, llm)?;
        Ok(Self::new(config_manager, registry))
    }
}
