//! API route definitions
//!
//! - /api/v1/events - event log tail, filterable by kind
//! - /api/v1/stats  - healing counters
//! - /api/v1/status - latest cycle observations
//! - /api/v1/services/:name/reset - queue a restart-attempt reset

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, DashboardState};

pub fn api_routes(state: DashboardState) -> Router {
    Router::new()
        .route("/events", get(handlers::get_events))
        .route("/stats", get(handlers::get_stats))
        .route("/status", get(handlers::get_status))
        .route("/services/:name/reset", post(handlers::reset_service))
        .with_state(state)
}

/// Liveness endpoint at root level
pub fn health_routes(state: DashboardState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
