//! Message REST API Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use parley_core::ConversationKey;
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    service::{MessagingService, PendingFanOut},
    types::{
        BeforeParams, FanOutReport, PageParams, ScrollParams, SendMessageRequest,
        SendMessageResponse,
    },
};

// ============================================================================
// SHARED STATE
// ============================================================================

/// Shared application state for message routes.
#[derive(Debug, Clone)]
pub struct MessageState {
    pub service: MessagingService,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/messages - Send a message
pub async fn send_message(
    State(state): State<Arc<MessageState>>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state
        .service
        .send_message(req.sender_id, req.receiver_id, req.content)
        .await?;

    let response = SendMessageResponse {
        fan_out: FanOutReport::from(&outcome.fan_out),
        message: outcome.record,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/messages/conversation/{conversation_id} - Messages, newest first
pub async fn list_conversation_messages(
    State(state): State<Arc<MessageState>>,
    Path(conversation_id): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let key = ConversationKey::parse(&conversation_id)?;
    let request = state.service.config().page_request(params.page, params.limit)?;

    let page = state
        .service
        .list_conversation_messages(key, request.page().into(), request.limit().into())
        .await?;
    Ok(Json(page))
}

/// GET /api/messages/conversation/{conversation_id}/before - Messages older than a timestamp
pub async fn list_messages_before(
    State(state): State<Arc<MessageState>>,
    Path(conversation_id): Path<String>,
    Query(params): Query<BeforeParams>,
) -> ApiResult<impl IntoResponse> {
    let key = ConversationKey::parse(&conversation_id)?;
    let request = state.service.config().page_request(params.page, params.limit)?;

    let page = state
        .service
        .list_messages_before(
            key,
            params.before_timestamp,
            request.page().into(),
            request.limit().into(),
        )
        .await?;
    Ok(Json(page))
}

/// GET /api/messages/conversation/{conversation_id}/scroll - Cursor window
pub async fn scroll_messages(
    State(state): State<Arc<MessageState>>,
    Path(conversation_id): Path<String>,
    Query(params): Query<ScrollParams>,
) -> ApiResult<impl IntoResponse> {
    let key = ConversationKey::parse(&conversation_id)?;
    let limit = params
        .limit
        .unwrap_or_else(|| i64::from(state.service.config().default_page_limit));

    let window = state
        .service
        .scroll_messages(key, params.before, limit)
        .await?;
    Ok(Json(window))
}

/// POST /api/messages/fan-out/repair - Re-drive pending index writes
pub async fn repair_fan_out(
    State(state): State<Arc<MessageState>>,
    Json(pending): Json<PendingFanOut>,
) -> ApiResult<impl IntoResponse> {
    if pending.entries.is_empty() {
        return Err(ApiError::invalid_input("entries must not be empty"));
    }
    let status = state.service.repair_fan_out(&pending).await?;
    Ok(Json(FanOutReport::from(&status)))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the message routes router.
pub fn create_router(service: MessagingService) -> axum::Router {
    let state = Arc::new(MessageState { service });

    axum::Router::new()
        .route("/", axum::routing::post(send_message))
        .route("/fan-out/repair", axum::routing::post(repair_fan_out))
        .route(
            "/conversation/:conversation_id",
            axum::routing::get(list_conversation_messages),
        )
        .route(
            "/conversation/:conversation_id/before",
            axum::routing::get(list_messages_before),
        )
        .route(
            "/conversation/:conversation_id/scroll",
            axum::routing::get(scroll_messages),
        )
        .with_state(state)
}
