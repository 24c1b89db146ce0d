//! Invocation wrapper shared by every agent

use super::result::{AgentError, AgentResult, ErrorRecord};
use super::{AgentContext, AgentKind, ResearchAgent};
use crate::budget::{CostLedger, CostMeter, OperationLabel, PriceTable};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Timeout and retry settings for agent invocations
#[derive(Debug, Clone)]
pub struct AdapterPolicy {
    /// Extra attempts after a transient failure; clamped to at most one
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub default_timeout: Duration,
    pub timeouts: HashMap<AgentKind, Duration>,
}

impl AdapterPolicy {
    pub fn timeout_for(&self, kind: AgentKind) -> Duration {
        self.timeouts
            .get(&kind)
            .copied()
            .unwrap_or(self.default_timeout)
    }
}

impl Default for AdapterPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_backoff: Duration::from_millis(500),
            default_timeout: Duration::from_secs(120),
            timeouts: HashMap::new(),
        }
    }
}

pub struct AgentAdapter {
    ledger: Arc<CostLedger>,
    prices: Arc<PriceTable>,
    policy: AdapterPolicy,
}

impl AgentAdapter {
    pub fn new(ledger: Arc<CostLedger>, prices: Arc<PriceTable>, policy: AdapterPolicy) -> Self {
        Self {
            ledger,
            prices,
            policy,
        }
    }

    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    pub fn policy(&self) -> &AdapterPolicy {
        &self.policy
    }

    /// Run one agent to a well-formed result. Never panics or returns early
    /// with an error: every failure mode ends up inside the `AgentResult`.
    pub async fn execute(&self, agent: Arc<dyn ResearchAgent>, ctx: &AgentContext) -> AgentResult {
        let kind = agent.kind();
        let span = tracing::info_span!("agent", run_id = %ctx.run_id, agent = %kind);
        self.execute_inner(agent, ctx).instrument(span).await
    }

    async fn execute_inner(&self, agent: Arc<dyn ResearchAgent>, ctx: &AgentContext) -> AgentResult {
        let kind = agent.kind();
        let started = Instant::now();
        let meter = CostMeter::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.prices),
            OperationLabel {
                run_id: Some(ctx.run_id.clone()),
                agent: Some(kind.to_string()),
            },
        );

        let estimate = agent.estimate(ctx, &self.prices);
        if let Err(denial) = meter.reserve(&estimate) {
            tracing::warn!(reason = %denial, "Budget denied, agent will not run");
            let mut result = match agent.fallback(ctx) {
                Some(payload) if payload.kind() == kind && payload.validate().is_ok() => {
                    tracing::info!("Using degraded fallback output");
                    AgentResult::degraded(kind, payload, denial)
                }
                _ => AgentResult::skipped(kind, denial),
            };
            result.duration_ms = started.elapsed().as_millis() as u64;
            return result;
        }

        let timeout = self.policy.timeout_for(kind);
        let max_retries = self.policy.max_retries.min(1);
        let mut attempts = 0;
        let mut retry_denial = None;

        let outcome = loop {
            attempts += 1;
            let outcome = self.attempt(&agent, ctx, &meter, timeout).await;
            match outcome {
                Err(e) if e.is_retryable() && attempts <= max_retries => {
                    // A retry repeats billable calls, so it is admitted like a fresh run
                    meter.release_held();
                    if let Err(denial) = meter.reserve(&agent.estimate(ctx, &self.prices)) {
                        tracing::warn!(reason = %denial, error = %e, "Budget denied retry");
                        retry_denial = Some(denial);
                        break Err(e);
                    }
                    tracing::warn!(attempt = attempts, error = %e, "Transient failure, retrying");
                    tokio::time::sleep(self.policy.retry_backoff).await;
                }
                other => break other,
            }
        };

        let report = meter.settle();
        let mut result = match outcome {
            Ok(payload) => {
                tracing::info!(
                    search_credits = report.cost.search_credits,
                    llm_usd = report.cost.llm_usd,
                    "Agent succeeded"
                );
                AgentResult::succeeded(kind, payload, report.cost)
            }
            Err(e) => {
                tracing::warn!(class = ?e.class(), error = %e, "Agent failed");
                AgentResult::failed(kind, ErrorRecord::from_error(kind, &e), report.cost)
            }
        };
        result.overruns = report.overruns;
        result.denial = retry_denial;
        result.attempts = attempts;
        result.duration_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn attempt(
        &self,
        agent: &Arc<dyn ResearchAgent>,
        ctx: &AgentContext,
        meter: &CostMeter,
        timeout: Duration,
    ) -> Result<super::AgentPayload, AgentError> {
        let kind = agent.kind();
        let guarded = AssertUnwindSafe(agent.run(ctx, meter)).catch_unwind();

        let payload = match tokio::time::timeout(timeout, guarded).await {
            Err(_) => return Err(AgentError::Timeout(timeout)),
            Ok(Err(panic)) => return Err(AgentError::Panicked(panic_message(panic.as_ref()))),
            Ok(Ok(result)) => result?,
        };

        if payload.kind() != kind {
            return Err(AgentError::InvalidOutput(format!(
                "{} agent returned a {} payload",
                kind,
                payload.kind()
            )));
        }
        payload.validate().map_err(AgentError::InvalidOutput)?;
        Ok(payload)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
