//! Health Check Endpoint
//!
//! `GET /health` reports process liveness and whether the store answers a
//! single-row read.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use parley_core::ConversationKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::service::MessagingService;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone)]
pub struct HealthState {
    pub service: MessagingService,
    pub start_time: Instant,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health - Liveness plus store reachability
pub async fn health(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let probe = ConversationKey::resolve(0, 0);
    let error = state
        .service
        .messages()
        .latest(probe)
        .await
        .err()
        .map(|e| e.to_string());

    let (code, status) = match error {
        None => (StatusCode::OK, HealthStatus::Healthy),
        Some(_) => (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::Unhealthy),
    };
    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        error,
    };
    (code, Json(response))
}

/// Create the health router.
pub fn create_router(service: MessagingService) -> Router {
    let state = Arc::new(HealthState {
        service,
        start_time: Instant::now(),
    });

    Router::new().route("/", get(health)).with_state(state)
}
