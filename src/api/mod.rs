//! Dashboard API using Axum
//!
//! - `GET /health`
//! - `GET /api/v1/events?kind=&limit=`
//! - `GET /api/v1/stats`
//! - `GET /api/v1/status`
//! - `POST /api/v1/services/:name/reset`

pub mod handlers;
pub mod reply;
mod routes;

pub use handlers::DashboardState;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// CORS is same-origin unless `HOSTMEND_CORS_ORIGINS` lists allowed origins
/// (comma-separated).
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    match std::env::var("HOSTMEND_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

pub fn create_app(state: DashboardState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(routes::health_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::MonitorStatus;
    use crate::healing::{HealingStats, ResetRequests};
    use crate::storage::EventStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::{Arc, RwLock};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_app_serves_nested_and_root_routes() {
        let dir = tempfile::tempdir().unwrap();
        let state = DashboardState {
            store: Arc::new(EventStore::open(dir.path().join("monitoring.json")).unwrap()),
            status: Arc::new(RwLock::new(MonitorStatus::default())),
            stats: Arc::new(RwLock::new(HealingStats::default())),
            resets: ResetRequests::default(),
        };
        let app = create_app(state);

        for uri in ["/health", "/api/v1/events", "/api/v1/stats", "/api/v1/status"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }

        let missing = app
            .oneshot(Request::builder().uri("/api/v1/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
