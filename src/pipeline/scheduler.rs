//! Phase scheduler
//!
//! Drives one run through discovery, the parallel research fan-out,
//! verification and synthesis. Each agent result is merged into the run
//! store the moment it resolves so pollers see progress phase by phase.

use crate::agents::payload::AgentPayload;
use crate::agents::{AgentAdapter, AgentContext, AgentKind, AgentRegistry, AgentResult};
use crate::runs::{Phase, RunStore};
use crate::types::{Company, Result};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What discovery left behind for the rest of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryVerdict {
    /// Company context exists; research may start
    Usable,
    /// No context could be established; the run cannot continue
    Unusable,
}

pub struct PhaseScheduler {
    registry: Arc<AgentRegistry>,
    adapter: Arc<AgentAdapter>,
    store: Arc<RunStore>,
}

impl PhaseScheduler {
    pub fn new(registry: Arc<AgentRegistry>, adapter: Arc<AgentAdapter>, store: Arc<RunStore>) -> Self {
        Self {
            registry,
            adapter,
            store,
        }
    }

    /// Context for an agent of the next phase, seeded from what the run holds now
    fn context(&self, run_id: &str, company: &Company, cancel: &CancellationToken) -> Result<AgentContext> {
        Ok(AgentContext {
            run_id: run_id.to_string(),
            company: company.clone(),
            prior: self.store.prior_outputs(run_id)?,
            cancel: cancel.clone(),
        })
    }

    async fn run_single(
        &self,
        kind: AgentKind,
        run_id: &str,
        company: &Company,
        cancel: &CancellationToken,
    ) -> Result<AgentResult> {
        let agent = self.registry.get(kind)?;
        let ctx = self.context(run_id, company, cancel)?;
        let result = self.adapter.execute(agent, &ctx).await;
        self.store.apply_result(run_id, &result)?;
        Ok(result)
    }

    /// Phase 1: a single discovery agent that must finish before research starts
    pub async fn discovery(
        &self,
        run_id: &str,
        company: &Company,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryVerdict> {
        self.store.set_phase(run_id, Phase::Discovery)?;
        tracing::info!(run_id = %run_id, "Phase started: discovery");

        let result = self.run_single(AgentKind::Discovery, run_id, company, cancel).await?;
        let usable = match &result.payload {
            Some(AgentPayload::Discovery(d)) => d.is_usable(),
            _ => false,
        };

        Ok(if usable {
            DiscoveryVerdict::Usable
        } else {
            DiscoveryVerdict::Unusable
        })
    }

    /// Phase 2: every research agent at once, joined before returning.
    ///
    /// Sibling failures are independent. A task that never reports back
    /// (aborted or panicked outside the adapter) is recorded as a failed
    /// placeholder so the phase always resolves with one result per agent.
    pub async fn research(
        &self,
        run_id: &str,
        company: &Company,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.store.set_phase(run_id, Phase::Research)?;
        tracing::info!(run_id = %run_id, "Phase started: research");

        let ctx = Arc::new(self.context(run_id, company, cancel)?);
        let mut set = JoinSet::new();

        for kind in AgentKind::RESEARCH {
            let agent = self.registry.get(kind)?;
            let adapter = Arc::clone(&self.adapter);
            let ctx = Arc::clone(&ctx);
            set.spawn(async move { adapter.execute(agent, &ctx).await });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => {
                    tracing::debug!(run_id = %run_id, agent = %result.agent, outcome = ?result.outcome, "Research agent resolved");
                    self.store.apply_result(run_id, &result)?;
                }
                Err(e) => {
                    tracing::error!(run_id = %run_id, error = %e, "Research task did not complete");
                }
            }
        }

        let run = self.store.get(run_id)?;
        for kind in AgentKind::RESEARCH {
            if !run.has_result(kind) {
                self.store
                    .apply_result(run_id, &AgentResult::missing(kind, "research task did not report a result"))?;
            }
        }
        Ok(())
    }

    /// Phase 3a: cross-validation over whatever research produced
    pub async fn verification(
        &self,
        run_id: &str,
        company: &Company,
        cancel: &CancellationToken,
    ) -> Result<AgentResult> {
        self.store.set_phase(run_id, Phase::Verification)?;
        tracing::info!(run_id = %run_id, "Phase started: verification");
        self.run_single(AgentKind::Verification, run_id, company, cancel).await
    }

    /// Phase 3b: synthesis runs even when verification degraded or failed
    pub async fn synthesis(
        &self,
        run_id: &str,
        company: &Company,
        cancel: &CancellationToken,
    ) -> Result<AgentResult> {
        self.store.set_phase(run_id, Phase::Synthesis)?;
        tracing::info!(run_id = %run_id, "Phase started: synthesis");
        self.run_single(AgentKind::Synthesis, run_id, company, cancel).await
    }
}
