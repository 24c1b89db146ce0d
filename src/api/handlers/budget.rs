use crate::{AppState, budget::BudgetStatus};
use axum::{Json, extract::State};

/// Spend against each cap, health classification and recent operations
pub async fn budget_status(State(state): State<AppState>) -> Json<BudgetStatus> {
    Json(state.ledger.status())
}
