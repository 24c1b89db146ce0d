use crate::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Routes mounted under `/api`
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            "/runs",
            get(crate::api::handlers::runs::list_runs).post(crate::api::handlers::runs::create_run),
        )
        .route("/runs/{run_id}", get(crate::api::handlers::runs::get_run))
        .route(
            "/runs/{run_id}/export.json",
            get(crate::api::handlers::runs::export_run),
        )
        .route(
            "/runs/{run_id}/cancel",
            post(crate::api::handlers::runs::cancel_run),
        )
        .route(
            "/budget/status",
            get(crate::api::handlers::budget::budget_status),
        )
}

/// The complete application: API routes, health check, CORS and request tracing
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .nest("/api", create_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
