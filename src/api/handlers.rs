//! API route handlers
//!
//! Read-only views over the event log and the state the control loop
//! publishes, plus one write: queueing a restart-attempt reset, which the
//! healing engine applies itself on its next cycle.

use std::sync::{Arc, PoisonError, RwLock};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::reply::{ApiError, CycleView};
use crate::background::MonitorStatus;
use crate::config::defaults::{EVENTS_DEFAULT_LIMIT, EVENTS_MAX_LIMIT};
use crate::healing::{HealingStats, ResetRequests};
use crate::monitoring::services::check_name;
use crate::storage::{Event, EventCategory, EventStore};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct DashboardState {
    pub store: Arc<EventStore>,
    /// Latest cycle published by the control loop
    pub status: Arc<RwLock<MonitorStatus>>,
    /// Healing counters published by the engine
    pub stats: Arc<RwLock<HealingStats>>,
    /// Attempt resets for the engine to apply
    pub resets: ResetRequests,
}

fn read_clone<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read()
        .unwrap_or_else(|e| {
            tracing::warn!("API state lock poisoned, recovering");
            PoisonError::into_inner(e)
        })
        .clone()
}

fn cycles(state: &DashboardState) -> u64 {
    state
        .status
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .cycles
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: i64,
    pub cycles: u64,
}

/// `GET /health`
pub async fn health_check(State(state): State<DashboardState>) -> Json<HealthResponse> {
    let status = read_clone(&state.status);
    Json(HealthResponse {
        status: if status.last_error.is_some() { "degraded" } else { "ok" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: (chrono::Utc::now() - status.started_at).num_seconds(),
        cycles: status.cycles,
    })
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub kind: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct EventsPayload {
    pub count: usize,
    pub events: Vec<Event>,
}

/// `GET /api/v1/events?kind=&limit=` - most recent events, oldest first.
pub async fn get_events(
    State(state): State<DashboardState>,
    Query(query): Query<EventsQuery>,
) -> Result<CycleView<EventsPayload>, ApiError> {
    let kind = query
        .kind
        .as_deref()
        .filter(|k| !k.is_empty())
        .map(str::parse::<EventCategory>)
        .transpose()
        .map_err(ApiError::BadRequest)?;
    let limit = query
        .limit
        .unwrap_or(EVENTS_DEFAULT_LIMIT)
        .min(EVENTS_MAX_LIMIT);

    let cycle = cycles(&state);
    let store = state.store.clone();
    let events = tokio::task::spawn_blocking(move || store.read_kind(kind, limit)).await??;
    Ok(CycleView::new(
        EventsPayload {
            count: events.len(),
            events,
        },
        cycle,
    ))
}

// ============================================================================
// Status and Stats
// ============================================================================

/// `GET /api/v1/stats`
pub async fn get_stats(State(state): State<DashboardState>) -> CycleView<HealingStats> {
    CycleView::new(read_clone(&state.stats), cycles(&state))
}

/// `GET /api/v1/status` - latest snapshot, services, alerts and actions.
pub async fn get_status(State(state): State<DashboardState>) -> CycleView<MonitorStatus> {
    let status = read_clone(&state.status);
    let cycle = status.cycles;
    CycleView::new(status, cycle)
}

// ============================================================================
// Restart Attempt Reset
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ResetQueued {
    pub service: String,
    /// Every reset still waiting for the next cycle
    pub pending: Vec<String>,
}

/// `POST /api/v1/services/:name/reset` - let an exhausted service be
/// restarted again. Applied at the start of the next cycle.
pub async fn reset_service(
    State(state): State<DashboardState>,
    Path(service): Path<String>,
) -> Result<(StatusCode, CycleView<ResetQueued>), ApiError> {
    check_name(&service).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.resets.request(&service);
    tracing::info!(service = %service, "Restart attempt reset queued");

    let queued = ResetQueued {
        service,
        pending: state.resets.pending(),
    };
    Ok((StatusCode::ACCEPTED, CycleView::new(queued, cycles(&state))))
}
