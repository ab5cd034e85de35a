//! JSON bodies for `/api/v1`
//!
//! A successful read is a [`CycleView`]: the payload plus the control-loop
//! cycle it reflects, so a polling dashboard can skip unchanged data.
//! Failures map to an [`ApiError`] rendered as `{"error", "kind"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::storage::StoreError;

/// Payload tagged with the cycle count it was read at.
#[derive(Debug, Serialize)]
pub struct CycleView<T> {
    pub data: T,
    /// Completed monitoring cycles when the payload was read
    pub cycle: u64,
    pub read_at: DateTime<Utc>,
}

impl<T> CycleView<T> {
    pub fn new(data: T, cycle: u64) -> Self {
        Self {
            data,
            cycle,
            read_at: Utc::now(),
        }
    }
}

impl<T: Serialize> IntoResponse for CycleView<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("event log unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("event log read did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Store(_) => "event_log",
            Self::Join(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if !matches!(self, Self::BadRequest(_)) {
            tracing::error!(error = %self, "API request failed");
        }
        let body = json!({ "error": self.to_string(), "kind": self.kind() });
        (self.status(), Json(body)).into_response()
    }
}
