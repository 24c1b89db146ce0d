//! Process-wide cost ledger
//!
//! Two independent accounts (search credits and LLM spend in USD) are tracked
//! against their caps. Admission is pessimistic: `reserve` checks committed
//! plus outstanding reservations before any billable call is made, and the
//! read-check-increment happens under a single lock so two concurrent agents
//! cannot both pass admission for the last unit of budget.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metered resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    SearchCredits,
    LlmUsd,
}

impl CostCategory {
    pub const ALL: [CostCategory; 2] = [CostCategory::SearchCredits, CostCategory::LlmUsd];

    fn index(self) -> usize {
        match self {
            CostCategory::SearchCredits => 0,
            CostCategory::LlmUsd => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CostCategory::SearchCredits => "search_credits",
            CostCategory::LlmUsd => "llm_usd",
        }
    }
}

impl fmt::Display for CostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured spend ceilings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetCaps {
    pub search_credits: f64,
    pub llm_usd: f64,
}

impl BudgetCaps {
    pub fn get(&self, category: CostCategory) -> f64 {
        match category {
            CostCategory::SearchCredits => self.search_credits,
            CostCategory::LlmUsd => self.llm_usd,
        }
    }
}

impl Default for BudgetCaps {
    fn default() -> Self {
        Self {
            search_credits: 20.0,
            llm_usd: 10.0,
        }
    }
}

/// Percent-of-cap thresholds for the coarse health classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    pub warning_percent: f64,
    pub critical_percent: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            warning_percent: 80.0,
            critical_percent: 95.0,
        }
    }
}

/// Running totals for both categories plus their caps
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSnapshot {
    pub search_credits: f64,
    pub search_credit_cap: f64,
    pub llm_usd: f64,
    pub llm_usd_cap: f64,
    pub llm_tokens: u64,
}

impl CostSnapshot {
    pub fn with_caps(caps: BudgetCaps) -> Self {
        Self {
            search_credit_cap: caps.search_credits,
            llm_usd_cap: caps.llm_usd,
            ..Default::default()
        }
    }

    pub fn consumed(&self, category: CostCategory) -> f64 {
        match category {
            CostCategory::SearchCredits => self.search_credits,
            CostCategory::LlmUsd => self.llm_usd,
        }
    }

    pub fn cap(&self, category: CostCategory) -> f64 {
        match category {
            CostCategory::SearchCredits => self.search_credit_cap,
            CostCategory::LlmUsd => self.llm_usd_cap,
        }
    }

    pub fn percent_used(&self, category: CostCategory) -> f64 {
        let cap = self.cap(category);
        if cap <= 0.0 {
            return 100.0;
        }
        (self.consumed(category) / cap) * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetHealth {
    Healthy,
    Warning,
    Critical,
}

impl BudgetHealth {
    pub fn classify(percent_used: f64, thresholds: &HealthThresholds) -> Self {
        if percent_used >= thresholds.critical_percent {
            BudgetHealth::Critical
        } else if percent_used >= thresholds.warning_percent {
            BudgetHealth::Warning
        } else {
            BudgetHealth::Healthy
        }
    }
}

/// Who a billable operation is attributed to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLabel {
    pub run_id: Option<String>,
    pub agent: Option<String>,
}

/// One entry of the rolling billable-operation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub timestamp: DateTime<Utc>,
    pub category: CostCategory,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// Budget status read model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub snapshot: CostSnapshot,
    pub search_percent_used: f64,
    pub llm_percent_used: f64,
    pub search_health: BudgetHealth,
    pub llm_health: BudgetHealth,
    /// Worst of the two category classifications
    pub health: BudgetHealth,
    pub recent_operations: Vec<OperationRecord>,
}

/// Why a reservation was refused
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetDenial {
    pub category: CostCategory,
    pub requested: f64,
    pub consumed: f64,
    pub reserved: f64,
    pub cap: f64,
}

impl fmt::Display for BudgetDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} budget denied: requested {:.4} with {:.4} consumed and {:.4} reserved of cap {:.4}",
            self.category, self.requested, self.consumed, self.reserved, self.cap
        )
    }
}

/// An admitted, not yet committed, amount of budget
///
/// Not `Clone`: a reservation is released exactly once.
#[derive(Debug)]
pub struct Reservation {
    id: u64,
    category: CostCategory,
    remaining: f64,
}

impl Reservation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn category(&self) -> CostCategory {
        self.category
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }
}

#[must_use]
#[derive(Debug)]
pub enum Admission {
    Allowed(Reservation),
    Denied(BudgetDenial),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed(_))
    }
}

/// Result of applying an actual cost
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommitOutcome {
    WithinCap,
    /// The actual cost pushed consumption past the cap. The operation had
    /// already run, so this is a warning, not a refusal.
    OverCap { consumed: f64, cap: f64 },
}

#[derive(Debug, Default, Clone, Copy)]
struct Account {
    cap: f64,
    consumed: f64,
    reserved: f64,
}

#[derive(Debug)]
struct LedgerState {
    accounts: [Account; 2],
    llm_tokens: u64,
    recent: VecDeque<OperationRecord>,
}

/// Process-wide budget ledger shared by every agent invocation
#[derive(Debug)]
pub struct CostLedger {
    state: Mutex<LedgerState>,
    thresholds: HealthThresholds,
    recent_limit: usize,
    next_reservation: AtomicU64,
}

impl CostLedger {
    pub fn new(caps: BudgetCaps) -> Self {
        Self::with_settings(caps, HealthThresholds::default(), 10)
    }

    pub fn with_settings(caps: BudgetCaps, thresholds: HealthThresholds, recent_limit: usize) -> Self {
        let mut accounts = [Account::default(); 2];
        for category in CostCategory::ALL {
            accounts[category.index()].cap = caps.get(category);
        }
        Self {
            state: Mutex::new(LedgerState {
                accounts,
                llm_tokens: 0,
                recent: VecDeque::with_capacity(recent_limit),
            }),
            thresholds,
            recent_limit,
            next_reservation: AtomicU64::new(1),
        }
    }

    /// Admission control: hold `amount` of `category` if it fits under the cap
    pub fn reserve(&self, category: CostCategory, amount: f64) -> Admission {
        let amount = amount.max(0.0);
        let mut state = self.state.lock();
        let account = &mut state.accounts[category.index()];

        if account.consumed + account.reserved + amount > account.cap {
            tracing::debug!(
                category = %category,
                amount,
                consumed = account.consumed,
                reserved = account.reserved,
                cap = account.cap,
                "Reservation denied"
            );
            return Admission::Denied(BudgetDenial {
                category,
                requested: amount,
                consumed: account.consumed,
                reserved: account.reserved,
                cap: account.cap,
            });
        }

        account.reserved += amount;
        let id = self.next_reservation.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(category = %category, amount, reservation = id, "Reservation admitted");
        Admission::Allowed(Reservation {
            id,
            category,
            remaining: amount,
        })
    }

    /// Apply an actual cost that was not drawn against a reservation
    pub fn commit(&self, category: CostCategory, amount: f64) -> CommitOutcome {
        self.apply(category, amount, None, &OperationLabel::default())
    }

    /// Apply an actual cost, releasing the matching part of `reservation` first
    pub fn commit_against(
        &self,
        reservation: &mut Reservation,
        amount: f64,
        label: &OperationLabel,
    ) -> CommitOutcome {
        let category = reservation.category;
        self.apply(category, amount, Some(reservation), label)
    }

    /// Apply an attributed actual cost with no reservation behind it
    pub fn commit_labeled(
        &self,
        category: CostCategory,
        amount: f64,
        label: &OperationLabel,
    ) -> CommitOutcome {
        self.apply(category, amount, None, label)
    }

    fn apply(
        &self,
        category: CostCategory,
        amount: f64,
        reservation: Option<&mut Reservation>,
        label: &OperationLabel,
    ) -> CommitOutcome {
        let amount = amount.max(0.0);
        let mut state = self.state.lock();
        let account = &mut state.accounts[category.index()];

        if let Some(reservation) = reservation {
            let drawn = reservation.remaining.min(amount);
            reservation.remaining -= drawn;
            account.reserved = (account.reserved - drawn).max(0.0);
        }
        account.consumed += amount;

        let outcome = if account.consumed > account.cap {
            CommitOutcome::OverCap {
                consumed: account.consumed,
                cap: account.cap,
            }
        } else {
            CommitOutcome::WithinCap
        };

        if amount > 0.0 {
            if state.recent.len() == self.recent_limit && self.recent_limit > 0 {
                state.recent.pop_front();
            }
            if self.recent_limit > 0 {
                state.recent.push_back(OperationRecord {
                    timestamp: Utc::now(),
                    category,
                    amount,
                    run_id: label.run_id.clone(),
                    agent: label.agent.clone(),
                });
            }
        }
        drop(state);

        if let CommitOutcome::OverCap { consumed, cap } = outcome {
            tracing::warn!(
                category = %category,
                consumed,
                cap,
                "Actual cost pushed spend past the cap"
            );
        }
        outcome
    }

    /// Return the unused remainder of a reservation
    pub fn release(&self, mut reservation: Reservation) {
        self.release_in_place(&mut reservation);
    }

    pub(crate) fn release_in_place(&self, reservation: &mut Reservation) {
        if reservation.remaining <= 0.0 {
            return;
        }
        let mut state = self.state.lock();
        let account = &mut state.accounts[reservation.category.index()];
        account.reserved = (account.reserved - reservation.remaining).max(0.0);
        tracing::debug!(
            category = %reservation.category,
            released = reservation.remaining,
            reservation = reservation.id,
            "Reservation released"
        );
        reservation.remaining = 0.0;
    }

    /// Count tokens toward the ledger's token total
    pub fn add_tokens(&self, tokens: u64) {
        self.state.lock().llm_tokens += tokens;
    }

    pub fn snapshot(&self) -> CostSnapshot {
        let state = self.state.lock();
        let search = state.accounts[CostCategory::SearchCredits.index()];
        let llm = state.accounts[CostCategory::LlmUsd.index()];
        CostSnapshot {
            search_credits: search.consumed,
            search_credit_cap: search.cap,
            llm_usd: llm.consumed,
            llm_usd_cap: llm.cap,
            llm_tokens: state.llm_tokens,
        }
    }

    /// Outstanding reserved amount for a category
    pub fn reserved(&self, category: CostCategory) -> f64 {
        self.state.lock().accounts[category.index()].reserved
    }

    pub fn caps(&self) -> BudgetCaps {
        let state = self.state.lock();
        BudgetCaps {
            search_credits: state.accounts[CostCategory::SearchCredits.index()].cap,
            llm_usd: state.accounts[CostCategory::LlmUsd.index()].cap,
        }
    }

    /// Replace the caps; consumption so far is kept. Used on config reload.
    pub fn set_caps(&self, caps: BudgetCaps) {
        let mut state = self.state.lock();
        for category in CostCategory::ALL {
            state.accounts[category.index()].cap = caps.get(category);
        }
        tracing::info!(
            search_credits = caps.search_credits,
            llm_usd = caps.llm_usd,
            "Budget caps updated"
        );
    }

    pub fn status(&self) -> BudgetStatus {
        let snapshot = self.snapshot();
        let recent_operations = self.state.lock().recent.iter().rev().cloned().collect();

        let search_percent_used = snapshot.percent_used(CostCategory::SearchCredits);
        let llm_percent_used = snapshot.percent_used(CostCategory::LlmUsd);
        let search_health = BudgetHealth::classify(search_percent_used, &self.thresholds);
        let llm_health = BudgetHealth::classify(llm_percent_used, &self.thresholds);

        BudgetStatus {
            snapshot,
            search_percent_used,
            llm_percent_used,
            search_health,
            llm_health,
            health: search_health.max(llm_health),
            recent_operations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;

    fn ledger(search: f64, llm: f64) -> CostLedger {
        CostLedger::new(BudgetCaps {
            search_credits: search,
            llm_usd: llm,
        })
    }

    #[test]
    fn test_set_caps_keeps_consumption() {
        let ledger = ledger(2.0, 1.0);
        ledger.commit(CostCategory::SearchCredits, 2.0);
        assert!(!ledger.reserve(CostCategory::SearchCredits, 1.0).is_allowed());

        ledger.set_caps(BudgetCaps {
            search_credits: 5.0,
            llm_usd: 1.0,
        });
        assert_eq!(ledger.snapshot().search_credits, 2.0);
        assert!(ledger.reserve(CostCategory::SearchCredits, 1.0).is_allowed());
    }

    #[test]
    fn test_reserve_within_cap_is_allowed() {
        let ledger = ledger(10.0, 1.0);
        let admission = ledger.reserve(CostCategory::SearchCredits, 4.0);
        assert!(admission.is_allowed());
        assert_eq!(ledger.reserved(CostCategory::SearchCredits), 4.0);
    }

    #[test]
    fn test_reserve_counts_outstanding_reservations() {
        let ledger = ledger(10.0, 1.0);
        let _first = ledger.reserve(CostCategory::SearchCredits, 6.0);
        match ledger.reserve(CostCategory::SearchCredits, 5.0) {
            Admission::Denied(denial) => {
                assert_eq!(denial.reserved, 6.0);
                assert_eq!(denial.cap, 10.0);
            }
            Admission::Allowed(_) => panic!("expected denial"),
        }
    }

    #[test]
    fn test_categories_are_independent() {
        let ledger = ledger(1.0, 1.0);
        let _ = ledger.commit(CostCategory::SearchCredits, 1.0);
        assert!(!ledger.reserve(CostCategory::SearchCredits, 1.0).is_allowed());
        assert!(ledger.reserve(CostCategory::LlmUsd, 0.5).is_allowed());
    }

    #[test]
    fn test_commit_against_reservation_releases_hold() {
        let ledger = ledger(10.0, 1.0);
        let Admission::Allowed(mut reservation) = ledger.reserve(CostCategory::SearchCredits, 3.0)
        else {
            panic!("expected admission");
        };

        let outcome = ledger.commit_against(&mut reservation, 2.0, &OperationLabel::default());
        assert_eq!(outcome, CommitOutcome::WithinCap);
        assert_eq!(ledger.reserved(CostCategory::SearchCredits), 1.0);

        ledger.release(reservation);
        assert_eq!(ledger.reserved(CostCategory::SearchCredits), 0.0);
        assert_eq!(ledger.snapshot().search_credits, 2.0);
    }

    #[test]
    fn test_overrun_is_reported_not_refused() {
        let ledger = ledger(10.0, 1.0);
        let Admission::Allowed(mut reservation) = ledger.reserve(CostCategory::LlmUsd, 0.9) else {
            panic!("expected admission");
        };
        let outcome = ledger.commit_against(&mut reservation, 1.2, &OperationLabel::default());
        assert!(matches!(outcome, CommitOutcome::OverCap { .. }));
        assert!((ledger.snapshot().llm_usd - 1.2).abs() < 1e-9);
        assert_eq!(ledger.reserved(CostCategory::LlmUsd), 0.0);
    }

    #[rstest]
    #[case(0.0, BudgetHealth::Healthy)]
    #[case(79.9, BudgetHealth::Healthy)]
    #[case(80.0, BudgetHealth::Warning)]
    #[case(94.99, BudgetHealth::Warning)]
    #[case(95.0, BudgetHealth::Critical)]
    #[case(130.0, BudgetHealth::Critical)]
    fn test_health_classification(#[case] percent: f64, #[case] expected: BudgetHealth) {
        assert_eq!(
            BudgetHealth::classify(percent, &HealthThresholds::default()),
            expected
        );
    }

    #[test]
    fn test_zero_cap_reads_as_exhausted() {
        let snapshot = CostSnapshot::with_caps(BudgetCaps {
            search_credits: 0.0,
            llm_usd: 1.0,
        });
        assert_eq!(snapshot.percent_used(CostCategory::SearchCredits), 100.0);
        assert_eq!(snapshot.percent_used(CostCategory::LlmUsd), 0.0);
    }

    #[test]
    fn test_status_health_is_worst_category() {
        let ledger = ledger(10.0, 1.0);
        let _ = ledger.commit(CostCategory::SearchCredits, 8.5);
        let _ = ledger.commit(CostCategory::LlmUsd, 0.1);
        let status = ledger.status();
        assert_eq!(status.search_health, BudgetHealth::Warning);
        assert_eq!(status.llm_health, BudgetHealth::Healthy);
        assert_eq!(status.health, BudgetHealth::Warning);
    }

    #[test]
    fn test_recent_operations_are_bounded_and_newest_first() {
        let ledger = CostLedger::with_settings(BudgetCaps::default(), HealthThresholds::default(), 3);
        for i in 1..=5 {
            let _ = ledger.commit(CostCategory::SearchCredits, i as f64);
        }
        let recent = ledger.status().recent_operations;
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].amount, 5.0);
        assert_eq!(recent[2].amount, 3.0);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_oversubscribe() {
        let ledger = Arc::new(ledger(5.0, 1.0));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.reserve(CostCategory::SearchCredits, 1.0).is_allowed()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }
}
