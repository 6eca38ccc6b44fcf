//! REST API Routes Module
//!
//! - `/api/messages` send, list, list-before, scroll and fan-out repair
//! - `/api/conversations` per-user listing and single conversation lookup
//! - `/health` liveness and store reachability

pub mod conversations;
pub mod health;
pub mod messages;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::ApiConfig, service::MessagingService};

/// Build the full application router.
pub fn create_api_router(service: MessagingService, config: &ApiConfig) -> Router {
    let api_routes = Router::new()
        .nest("/messages", messages::create_router(service.clone()))
        .nest("/conversations", conversations::create_router(service.clone()));

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health::create_router(service))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
}
