//! Run orchestrator
//!
//! Accepts run requests, serves fresh results from the cache, and drives
//! each new run through the phase scheduler on a background task. Every run
//! it starts reaches a terminal status, including when the driver panics.

use super::scheduler::{DiscoveryVerdict, PhaseScheduler};
use crate::agents::{AgentAdapter, AgentKind, AgentOutcome, AgentRegistry, ErrorRecord};
use crate::runs::{NoteKind, Run, RunNote, RunStatus, RunStore};
use crate::types::{CancelResponse, Company, Result, RunCreated};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Orchestrator {
    store: Arc<RunStore>,
    scheduler: PhaseScheduler,
    cache_ttl: chrono::Duration,
    cancellations: Mutex<HashMap<String, CancellationToken>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<RunStore>,
        registry: Arc<AgentRegistry>,
        adapter: Arc<AgentAdapter>,
        cache_ttl: chrono::Duration,
    ) -> Self {
        Self {
            scheduler: PhaseScheduler::new(registry, adapter, Arc::clone(&store)),
            store,
            cache_ttl,
            cancellations: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<RunStore> {
        &self.store
    }

    /// Start a run for `company`, or hand back a fresh cached one. A zero
    /// TTL disables the cache.
    ///
    /// Returns as soon as the run is registered; the phases execute in the
    /// background and progress is visible through the store.
    pub fn start_run(self: &Arc<Self>, company: Company) -> Result<RunCreated> {
        let cached = if self.cache_ttl > chrono::Duration::zero() {
            self.store.find_cached(&company, self.cache_ttl)
        } else {
            None
        };
        if let Some(run) = cached {
            tracing::info!(run_id = %run.id, company = %company.name, "Serving cached run");
            return Ok(RunCreated {
                run_id: run.id,
                status: run.status,
                cached: true,
            });
        }

        let name = company.name.clone();
        let run_id = self.store.create(company.clone());
        let token = CancellationToken::new();
        self.cancellations.lock().insert(run_id.clone(), token.clone());
        self.store.set_status(&run_id, RunStatus::Running)?;

        let this = Arc::clone(self);
        let id = run_id.clone();
        tokio::spawn(async move {
            let driven = AssertUnwindSafe(this.drive(&id, &company, &token))
                .catch_unwind()
                .await;
            match driven {
                Ok(Ok(status)) => {
                    tracing::info!(run_id = %id, status = %status, "Run finished");
                }
                Ok(Err(e)) => {
                    tracing::error!(run_id = %id, error = %e, "Run driver failed");
                    this.force_error(&id, format!("run driver failed: {}", e));
                }
                Err(_) => {
                    tracing::error!(run_id = %id, "Run driver panicked");
                    this.force_error(&id, "run driver panicked");
                }
            }
            this.cancellations.lock().remove(&id);
        });

        tracing::info!(run_id = %run_id, company = %name, "Run started");
        Ok(RunCreated {
            run_id,
            status: RunStatus::Running,
            cached: false,
        })
    }

    /// Request cooperative cancellation.
    ///
    /// In-flight agents finish; no further phase starts and the run ends in
    /// `error`. Returns `cancelled: false` for runs that already finished or
    /// whose driver has already committed to a final status.
    pub fn cancel(&self, run_id: &str) -> Result<CancelResponse> {
        let status = self.store.status(run_id)?;
        let not_cancelled = CancelResponse {
            run_id: run_id.to_string(),
            cancelled: false,
        };
        if status.is_terminal() {
            return Ok(not_cancelled);
        }

        // Held until the token is tripped so `seal` sees either all of it or none
        let cancellations = self.cancellations.lock();
        let Some(token) = cancellations.get(run_id) else {
            tracing::debug!(run_id = %run_id, "Cancel arrived after the run was sealed");
            return Ok(not_cancelled);
        };

        if !token.is_cancelled() {
            self.store.add_note(
                run_id,
                RunNote::new(NoteKind::CancellationRequested, None, "cancellation requested"),
            )?;
            token.cancel();
            tracing::info!(run_id = %run_id, "Cancellation requested");
        }

        Ok(CancelResponse {
            run_id: run_id.to_string(),
            cancelled: true,
        })
    }

    /// Stop accepting cancellation for `run_id`. Returns false when a
    /// cancellation got in first.
    fn seal(&self, run_id: &str, cancel: &CancellationToken) -> bool {
        let mut cancellations = self.cancellations.lock();
        cancellations.remove(run_id);
        !cancel.is_cancelled()
    }

    async fn drive(&self, run_id: &str, company: &Company, cancel: &CancellationToken) -> Result<RunStatus> {
        let verdict = self.scheduler.discovery(run_id, company, cancel).await?;
        if verdict == DiscoveryVerdict::Unusable {
            if !self.seal(run_id, cancel) {
                return self.finish_cancelled(run_id);
            }
            let run = self.store.get(run_id)?;
            if !run.has_fatal_error() {
                self.store.append_error(
                    run_id,
                    ErrorRecord::fatal(
                        Some(AgentKind::Discovery),
                        "discovery could not establish company context",
                    ),
                )?;
            }
            return self.finish(run_id, RunStatus::Error);
        }
        if cancel.is_cancelled() {
            return self.finish_cancelled(run_id);
        }

        self.scheduler.research(run_id, company, cancel).await?;
        if cancel.is_cancelled() {
            return self.finish_cancelled(run_id);
        }

        self.scheduler.verification(run_id, company, cancel).await?;
        if cancel.is_cancelled() {
            return self.finish_cancelled(run_id);
        }

        self.scheduler.synthesis(run_id, company, cancel).await?;
        if !self.seal(run_id, cancel) {
            return self.finish_cancelled(run_id);
        }

        let run = self.store.get(run_id)?;
        let status = terminal_status(&run);
        if status == RunStatus::Error {
            self.store.append_error(
                run_id,
                ErrorRecord::fatal(Some(AgentKind::Synthesis), "no usable insight document was produced"),
            )?;
        }
        self.finish(run_id, status)
    }

    fn finish(&self, run_id: &str, status: RunStatus) -> Result<RunStatus> {
        self.store.set_status(run_id, status)?;
        Ok(status)
    }

    fn finish_cancelled(&self, run_id: &str) -> Result<RunStatus> {
        self.store
            .append_error(run_id, ErrorRecord::fatal(None, "run cancelled"))?;
        self.finish(run_id, RunStatus::Error)
    }

    /// Last resort after the driver itself failed
    fn force_error(&self, run_id: &str, message: impl Into<String>) {
        let message = message.into();
        if let Err(e) = self.store.append_error(run_id, ErrorRecord::fatal(None, message)) {
            tracing::warn!(run_id = %run_id, error = %e, "Could not record driver failure");
        }
        if let Err(e) = self.store.set_status(run_id, RunStatus::Error) {
            tracing::warn!(run_id = %run_id, error = %e, "Could not force run into error");
        }
    }
}

/// Classify a run whose every phase has been attempted.
///
/// Without a minimum-viable insight document the run is an error. With one,
/// it is complete only when no errors were recorded and every agent either
/// succeeded or was a non-load-bearing budget skip.
pub fn terminal_status(run: &Run) -> RunStatus {
    let viable = run
        .insights
        .as_ref()
        .is_some_and(|doc| doc.is_minimum_viable());
    if !viable {
        return RunStatus::Error;
    }

    let clean = run.errors.is_empty()
        && AgentKind::ALL.iter().all(|kind| match run.outcome_of(*kind) {
            Some(AgentOutcome::Succeeded) => true,
            Some(AgentOutcome::Skipped) => !kind.is_load_bearing(),
            _ => false,
        });

    if clean {
        RunStatus::Complete
    } else {
        RunStatus::Partial
    }
}
