//! Budget enforcement across search credits and LLM spend
//!
//! - [`ledger`] - process-wide admission control and running totals
//! - [`meter`] - per-invocation handle that commits actual cost
//! - [`pricing`] - token price table

pub mod ledger;
pub mod meter;
pub mod pricing;

pub use ledger::{
    Admission, BudgetCaps, BudgetDenial, BudgetHealth, BudgetStatus, CommitOutcome, CostCategory,
    CostLedger, CostSnapshot, HealthThresholds, OperationLabel, OperationRecord, Reservation,
};
pub use meter::{AgentCost, BudgetOverrun, CostEstimate, CostMeter, MeterReport};
pub use pricing::{ModelPrice, PriceTable, TokenUsage};
