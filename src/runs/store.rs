//! In-memory run state store
//!
//! The store owns every `Run`. Other components hold run ids only and go
//! through the mutation API below, which takes the run's own lock for the
//! length of an in-memory merge. Locks are `parking_lot` mutexes and are
//! never held across an `.await`.

use super::model::{AgentSummary, CompanyKey, NoteKind, Phase, Run, RunNote, RunStatus, RunSummary};
use crate::agents::payload::AgentPayload;
use crate::agents::{AgentOutcome, AgentResult, ErrorRecord, PriorOutputs};
use crate::budget::BudgetCaps;
use crate::types::{AppError, Company, Result};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub struct RunStore {
    runs: RwLock<HashMap<String, Arc<Mutex<Run>>>>,
    /// Run ids per normalized company, oldest first
    by_company: RwLock<HashMap<CompanyKey, Vec<String>>>,
    caps: RwLock<BudgetCaps>,
    max_finished: usize,
}

const DEFAULT_MAX_FINISHED: usize = 1000;

impl RunStore {
    pub fn new(caps: BudgetCaps) -> Self {
        Self::with_retention(caps, DEFAULT_MAX_FINISHED)
    }

    /// Keep at most `max_finished` terminal runs; runs in flight are never evicted
    pub fn with_retention(caps: BudgetCaps, max_finished: usize) -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            by_company: RwLock::new(HashMap::new()),
            caps: RwLock::new(caps),
            max_finished: max_finished.max(1),
        }
    }

    /// Caps stamped on runs created from now on
    pub fn set_caps(&self, caps: BudgetCaps) {
        *self.caps.write() = caps;
    }

    /// Create a `pending` run and return its id
    pub fn create(&self, company: Company) -> String {
        let id = Uuid::new_v4().to_string();
        let key = CompanyKey::new(&company);
        let run = Run::new(id.clone(), company, *self.caps.read());
        self.runs.write().insert(id.clone(), Arc::new(Mutex::new(run)));
        self.by_company.write().entry(key).or_default().push(id.clone());
        tracing::debug!(run_id = %id, "Run created");
        id
    }

    fn handle(&self, run_id: &str) -> Result<Arc<Mutex<Run>>> {
        self.runs
            .read()
            .get(run_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Run '{}' not found", run_id)))
    }

    /// Apply `f` to a non-terminal run under its lock
    fn mutate<T>(&self, run_id: &str, f: impl FnOnce(&mut Run) -> Result<T>) -> Result<T> {
        let handle = self.handle(run_id)?;
        let mut run = handle.lock();
        if run.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Run '{}' is {} and can no longer change",
                run_id, run.status
            )));
        }
        let value = f(&mut run)?;
        run.updated_at = Utc::now();
        Ok(value)
    }

    /// Merge one agent's result into the run.
    ///
    /// Idempotent per (run, agent): a replay returns `Ok(false)` and leaves
    /// the run untouched.
    pub fn apply_result(&self, run_id: &str, result: &AgentResult) -> Result<bool> {
        self.mutate(run_id, |run| {
            let agent = result.agent;
            if !run.applied.insert(agent) {
                tracing::debug!(run_id = %run.id, agent = %agent, "Duplicate result ignored");
                return Ok(false);
            }

            run.agents.insert(
                agent,
                AgentSummary {
                    outcome: result.outcome,
                    attempts: result.attempts,
                    duration_ms: result.duration_ms,
                    cost: result.cost,
                },
            );

            run.cost.search_credits += result.cost.search_credits;
            run.cost.llm_usd += result.cost.llm_usd;
            run.cost.llm_tokens += result.cost.tokens();

            if let Some(payload) = &result.payload {
                merge_payload(run, payload.clone());
            }
            if let Some(error) = &result.error {
                run.errors.push(error.clone());
            }
            if let Some(denial) = &result.denial {
                let kind = match result.outcome {
                    AgentOutcome::Degraded => NoteKind::Degraded,
                    _ => NoteKind::BudgetSkip,
                };
                run.notes.push(RunNote::new(kind, Some(agent), denial.to_string()));
            }
            for overrun in &result.overruns {
                run.notes.push(RunNote::new(
                    NoteKind::BudgetOverrun,
                    Some(agent),
                    format!(
                        "{} spend {:.4} exceeded cap {:.4}",
                        overrun.category, overrun.consumed, overrun.cap
                    ),
                ));
            }
            Ok(true)
        })
    }

    pub fn append_error(&self, run_id: &str, error: ErrorRecord) -> Result<()> {
        self.mutate(run_id, |run| {
            run.errors.push(error);
            Ok(())
        })
    }

    pub fn add_note(&self, run_id: &str, note: RunNote) -> Result<()> {
        self.mutate(run_id, |run| {
            run.notes.push(note);
            Ok(())
        })
    }

    pub fn set_phase(&self, run_id: &str, phase: Phase) -> Result<()> {
        self.mutate(run_id, |run| {
            run.current_phase = Some(phase);
            Ok(())
        })
    }

    /// Move the run along its status machine; backwards or repeated
    /// transitions are rejected with `Conflict`
    pub fn set_status(&self, run_id: &str, status: RunStatus) -> Result<()> {
        self.mutate(run_id, |run| {
            if !run.status.can_transition_to(status) {
                return Err(AppError::Conflict(format!(
                    "Run '{}' cannot move from {} to {}",
                    run.id, run.status, status
                )));
            }
            run.status = status;
            if status.is_terminal() {
                run.completed_at = Some(Utc::now());
            }
            Ok(())
        })?;

        if status.is_terminal() {
            self.prune(run_id);
        }
        Ok(())
    }

    /// Evict finished runs beyond the retention limit, `error` runs first and
    /// then the oldest. `keep` is the run that just finished.
    fn prune(&self, keep: &str) {
        let handles: Vec<_> = self.runs.read().values().cloned().collect();
        let mut finished: Vec<_> = handles
            .iter()
            .filter_map(|h| {
                let run = h.lock();
                run.status.is_terminal().then(|| {
                    (
                        run.status != RunStatus::Error,
                        run.completed_at,
                        run.id.clone(),
                        CompanyKey::new(&run.company),
                    )
                })
            })
            .collect();
        if finished.len() <= self.max_finished {
            return;
        }

        finished.retain(|(_, _, id, _)| id != keep);
        finished.sort();
        let excess = finished.len() + 1 - self.max_finished;

        let mut runs = self.runs.write();
        let mut by_company = self.by_company.write();
        for (_, _, id, key) in finished.into_iter().take(excess) {
            runs.remove(&id);
            if let Some(ids) = by_company.get_mut(&key) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    by_company.remove(&key);
                }
            }
            tracing::debug!(run_id = %id, "Finished run evicted");
        }
    }

    /// Snapshot of the run
    pub fn get(&self, run_id: &str) -> Result<Run> {
        Ok(self.handle(run_id)?.lock().clone())
    }

    pub fn status(&self, run_id: &str) -> Result<RunStatus> {
        Ok(self.handle(run_id)?.lock().status)
    }

    pub fn prior_outputs(&self, run_id: &str) -> Result<PriorOutputs> {
        Ok(self.handle(run_id)?.lock().prior_outputs())
    }

    /// The run document as served to pollers
    pub fn read(&self, run_id: &str) -> Result<Vec<u8>> {
        let handle = self.handle(run_id)?;
        let run = handle.lock();
        serialize(&run)
    }

    /// Same bytes as [`read`](Self::read), for terminal runs only
    pub fn export(&self, run_id: &str) -> Result<Vec<u8>> {
        let handle = self.handle(run_id)?;
        let run = handle.lock();
        if !run.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Run '{}' is still {}; export is available once it finishes",
                run_id, run.status
            )));
        }
        serialize(&run)
    }

    /// Run summaries, newest first
    pub fn list(&self) -> Vec<RunSummary> {
        let handles: Vec<_> = self.runs.read().values().cloned().collect();
        let mut summaries: Vec<RunSummary> = handles.iter().map(|h| h.lock().summary()).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// Newest `complete` or `partial` run for the same company that finished
    /// within `ttl`
    pub fn find_cached(&self, company: &Company, ttl: chrono::Duration) -> Option<Run> {
        let key = CompanyKey::new(company);
        let cutoff = Utc::now() - ttl;
        let ids = self.by_company.read().get(&key).cloned()?;
        let handles: Vec<_> = {
            let runs = self.runs.read();
            ids.iter().filter_map(|id| runs.get(id).cloned()).collect()
        };

        handles
            .iter()
            .filter_map(|h| {
                let run = h.lock();
                let fresh = run.completed_at.is_some_and(|t| t >= cutoff);
                let servable = matches!(run.status, RunStatus::Complete | RunStatus::Partial);
                if fresh && servable {
                    Some(run.clone())
                } else {
                    None
                }
            })
            .max_by_key(|run| run.completed_at)
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }
}

fn serialize(run: &Run) -> Result<Vec<u8>> {
    serde_json::to_vec(run).map_err(|e| AppError::Internal(format!("Failed to serialize run: {}", e)))
}

/// Replace the category container for this payload; each category is
/// written at most once per run
fn merge_payload(run: &mut Run, payload: AgentPayload) {
    match payload {
        AgentPayload::Discovery(d) => run.discovery = Some(d),
        AgentPayload::News(n) => run.sources = n.sources,
        AgentPayload::Patent(p) => run.patents = p.patents,
        AgentPayload::Founder(f) => run.founders = f.founders,
        AgentPayload::Competitive(c) => run.competitive_analysis = Some(c),
        AgentPayload::DeepDive(d) => run.deep_dive_analysis = Some(d),
        AgentPayload::Verification(v) => run.verification_analysis = Some(v),
        AgentPayload::Synthesis(s) => run.insights = Some(s),
    }
}
