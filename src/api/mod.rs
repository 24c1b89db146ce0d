//! HTTP API Handlers and Routes
//!
//! REST layer built on Axum.
//!
//! # API Endpoints
//!
//! ## Runs (`/api/runs`)
//! - `POST /api/runs` - Start a run for `{"company", "domain"?}`
//! - `GET /api/runs` - Run history, newest first
//! - `GET /api/runs/{run_id}` - Poll a run
//! - `GET /api/runs/{run_id}/export.json` - Download a finished run
//! - `POST /api/runs/{run_id}/cancel` - Request cooperative cancellation
//!
//! ## Budget (`/api/budget`)
//! - `GET /api/budget/status` - Spend, caps and health
//!
//! ## Health
//! - `GET /health` - Liveness check
//!
//! Errors are returned as `{"error": "..."}` with a matching status code.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
