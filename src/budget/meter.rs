//! Per-invocation cost meter
//!
//! A `CostMeter` is handed to every agent invocation. It holds the
//! invocation's reservations, prices LLM usage, and commits each billable
//! call to the shared ledger as soon as it is reported, so work done by an
//! agent that later times out is still accounted for.

use super::ledger::{
    Admission, BudgetDenial, CommitOutcome, CostCategory, CostLedger, OperationLabel, Reservation,
};
use super::pricing::{PriceTable, TokenUsage};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pre-call cost estimate used for admission control
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub search_credits: f64,
    pub llm_usd: f64,
}

impl CostEstimate {
    pub fn search(credits: f64) -> Self {
        Self {
            search_credits: credits,
            llm_usd: 0.0,
        }
    }

    pub fn llm(usd: f64) -> Self {
        Self {
            search_credits: 0.0,
            llm_usd: usd,
        }
    }

    pub fn with_llm(mut self, usd: f64) -> Self {
        self.llm_usd += usd;
        self
    }

    fn amount(&self, category: CostCategory) -> f64 {
        match category {
            CostCategory::SearchCredits => self.search_credits,
            CostCategory::LlmUsd => self.llm_usd,
        }
    }
}

/// Actual cost incurred by one agent invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentCost {
    pub search_credits: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub llm_usd: f64,
}

impl AgentCost {
    pub fn is_zero(&self) -> bool {
        self.search_credits == 0.0 && self.llm_usd == 0.0 && self.input_tokens == 0 && self.output_tokens == 0
    }

    pub fn tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: &AgentCost) {
        self.search_credits += other.search_credits;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.llm_usd += other.llm_usd;
    }
}

/// A commit that pushed a category past its cap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetOverrun {
    pub category: CostCategory,
    pub consumed: f64,
    pub cap: f64,
}

/// What a meter reports once its invocation is over
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeterReport {
    pub cost: AgentCost,
    pub overruns: Vec<BudgetOverrun>,
}

#[derive(Debug, Default)]
struct MeterState {
    reservations: Vec<Reservation>,
    cost: AgentCost,
    overruns: Vec<BudgetOverrun>,
}

pub struct CostMeter {
    ledger: Arc<CostLedger>,
    prices: Arc<PriceTable>,
    label: OperationLabel,
    state: Mutex<MeterState>,
}

impl CostMeter {
    pub fn new(ledger: Arc<CostLedger>, prices: Arc<PriceTable>, label: OperationLabel) -> Self {
        Self {
            ledger,
            prices,
            label,
            state: Mutex::new(MeterState::default()),
        }
    }

    /// Reserve every non-zero category of `estimate`.
    ///
    /// Either all categories are held or none are: on a denial any
    /// reservation already taken by this call is returned to the ledger.
    pub fn reserve(&self, estimate: &CostEstimate) -> Result<(), BudgetDenial> {
        let mut held = Vec::new();
        for category in CostCategory::ALL {
            let amount = estimate.amount(category);
            if amount <= 0.0 {
                continue;
            }
            match self.ledger.reserve(category, amount) {
                Admission::Allowed(reservation) => held.push(reservation),
                Admission::Denied(denial) => {
                    for reservation in held {
                        self.ledger.release(reservation);
                    }
                    return Err(denial);
                }
            }
        }
        self.state.lock().reservations.extend(held);
        Ok(())
    }

    /// Account for search credits spent by one call
    pub fn record_search(&self, credits: f64) {
        if credits <= 0.0 {
            return;
        }
        let mut state = self.state.lock();
        let outcome = self.commit(&mut state, CostCategory::SearchCredits, credits);
        state.cost.search_credits += credits;
        Self::note_outcome(&mut state, CostCategory::SearchCredits, outcome);
    }

    /// Price and account for one LLM call; returns the USD cost
    pub fn record_llm(&self, model: &str, usage: TokenUsage) -> f64 {
        let usd = self.prices.cost(model, usage);
        self.ledger.add_tokens(usage.total());

        let mut state = self.state.lock();
        let outcome = self.commit(&mut state, CostCategory::LlmUsd, usd);
        state.cost.input_tokens += usage.input_tokens;
        state.cost.output_tokens += usage.output_tokens;
        state.cost.llm_usd += usd;
        Self::note_outcome(&mut state, CostCategory::LlmUsd, outcome);
        usd
    }

    /// Cost accumulated so far
    pub fn cost(&self) -> AgentCost {
        self.state.lock().cost
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    /// Return every unused reservation to the ledger; recorded cost is kept
    pub fn release_held(&self) {
        let mut state = self.state.lock();
        for mut reservation in state.reservations.drain(..) {
            self.ledger.release_in_place(&mut reservation);
        }
    }

    /// Release unused reservations and report the invocation's cost
    pub fn settle(&self) -> MeterReport {
        let mut state = self.state.lock();
        for mut reservation in state.reservations.drain(..) {
            self.ledger.release_in_place(&mut reservation);
        }
        MeterReport {
            cost: state.cost,
            overruns: std::mem::take(&mut state.overruns),
        }
    }

    fn commit(&self, state: &mut MeterState, category: CostCategory, amount: f64) -> CommitOutcome {
        match state
            .reservations
            .iter_mut()
            .find(|r| r.category() == category && r.remaining() > 0.0)
        {
            Some(reservation) => self.ledger.commit_against(reservation, amount, &self.label),
            None => self.ledger.commit_labeled(category, amount, &self.label),
        }
    }

    fn note_outcome(state: &mut MeterState, category: CostCategory, outcome: CommitOutcome) {
        if let CommitOutcome::OverCap { consumed, cap } = outcome {
            state.overruns.push(BudgetOverrun {
                category,
                consumed,
                cap,
            });
        }
    }
}

impl Drop for CostMeter {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for mut reservation in state.reservations.drain(..) {
            self.ledger.release_in_place(&mut reservation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::ledger::BudgetCaps;

    fn meter(ledger: &Arc<CostLedger>) -> CostMeter {
        CostMeter::new(
            Arc::clone(ledger),
            Arc::new(PriceTable::default()),
            OperationLabel {
                run_id: Some("run-1".to_string()),
                agent: Some("news".to_string()),
            },
        )
    }

    #[test]
    fn test_reserve_is_all_or_nothing() {
        let ledger = Arc::new(CostLedger::new(BudgetCaps {
            search_credits: 5.0,
            llm_usd: 0.01,
        }));
        let meter = meter(&ledger);

        let err = meter
            .reserve(&CostEstimate::search(2.0).with_llm(1.0))
            .unwrap_err();
        assert_eq!(err.category, CostCategory::LlmUsd);
        assert_eq!(ledger.reserved(CostCategory::SearchCredits), 0.0);
    }

    #[test]
    fn test_record_commits_immediately_and_settle_releases() {
        let ledger = Arc::new(CostLedger::new(BudgetCaps::default()));
        let meter = meter(&ledger);
        meter.reserve(&CostEstimate::search(3.0)).unwrap();

        meter.record_search(1.0);
        assert_eq!(ledger.snapshot().search_credits, 1.0);
        assert_eq!(ledger.reserved(CostCategory::SearchCredits), 2.0);

        let report = meter.settle();
        assert_eq!(report.cost.search_credits, 1.0);
        assert!(report.overruns.is_empty());
        assert_eq!(ledger.reserved(CostCategory::SearchCredits), 0.0);
    }

    #[test]
    fn test_record_llm_prices_tokens() {
        let ledger = Arc::new(CostLedger::new(BudgetCaps::default()));
        let meter = meter(&ledger);

        let usd = meter.record_llm("gpt-4o-mini", TokenUsage::new(1_000_000, 0));
        assert!((usd - 0.15).abs() < 1e-9);

        let cost = meter.cost();
        assert_eq!(cost.input_tokens, 1_000_000);
        assert_eq!(ledger.snapshot().llm_tokens, 1_000_000);
        assert_eq!(ledger.status().recent_operations[0].agent.as_deref(), Some("news"));
    }

    #[test]
    fn test_overrun_is_reported_in_settlement() {
        let ledger = Arc::new(CostLedger::new(BudgetCaps {
            search_credits: 1.0,
            llm_usd: 1.0,
        }));
        let meter = meter(&ledger);
        meter.reserve(&CostEstimate::search(1.0)).unwrap();
        meter.record_search(2.0);

        let report = meter.settle();
        assert_eq!(report.overruns.len(), 1);
        assert_eq!(report.overruns[0].category, CostCategory::SearchCredits);
    }

    #[test]
    fn test_release_held_keeps_recorded_cost() {
        let ledger = Arc::new(CostLedger::new(BudgetCaps::default()));
        let meter = meter(&ledger);
        meter.reserve(&CostEstimate::search(4.0)).unwrap();
        meter.record_search(1.0);

        meter.release_held();
        assert_eq!(ledger.reserved(CostCategory::SearchCredits), 0.0);
        assert_eq!(ledger.snapshot().search_credits, 1.0);
        assert_eq!(meter.cost().search_credits, 1.0);
    }

    #[test]
    fn test_drop_releases_reservations() {
        let ledger = Arc::new(CostLedger::new(BudgetCaps::default()));
        {
            let meter = meter(&ledger);
            meter.reserve(&CostEstimate::llm(0.5)).unwrap();
            assert!(ledger.reserved(CostCategory::LlmUsd) > 0.0);
        }
        assert_eq!(ledger.reserved(CostCategory::LlmUsd), 0.0);
    }
}
