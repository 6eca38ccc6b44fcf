//! Parley API Server Entry Point
//!
//! Loads configuration from the environment, wires the messaging service
//! over the in-memory store, and starts the Axum HTTP server.

use std::sync::Arc;

use axum::Router;
use parley_api::{
    create_api_router,
    telemetry::{init_tracing, LogFormat},
    ApiConfig, ApiError, ApiResult, MessagingService,
};
use parley_core::MessageIdGenerator;
use parley_storage::InMemoryStore;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(LogFormat::from_env())?;

    let api_config = ApiConfig::from_env()?;

    let store = Arc::new(InMemoryStore::new());
    let ids = Arc::new(MessageIdGenerator::system());
    let service = MessagingService::new(store, ids, api_config.parley.clone())?;

    let app: Router = create_api_router(service, &api_config);

    let addr = api_config.bind_addr()?;
    tracing::info!(
        %addr,
        keyspace = %api_config.parley.keyspace,
        "Starting Parley API server"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
