//! Conversation REST API Routes

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use parley_core::{ConversationKey, UserId};
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    service::MessagingService,
    types::PageParams,
};

#[derive(Debug, Clone)]
pub struct ConversationState {
    pub service: MessagingService,
}

/// GET /api/conversations/user/{user_id} - A user's conversations, most recent first
pub async fn list_user_conversations(
    State(state): State<Arc<ConversationState>>,
    Path(user_id): Path<UserId>,
    Query(params): Query<PageParams>,
) -> ApiResult<impl IntoResponse> {
    let request = state.service.config().page_request(params.page, params.limit)?;

    let page = state
        .service
        .list_user_conversations(user_id, request.page().into(), request.limit().into())
        .await?;
    Ok(Json(page))
}

/// GET /api/conversations/{conversation_id} - One conversation
pub async fn get_conversation(
    State(state): State<Arc<ConversationState>>,
    Path(conversation_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let key = ConversationKey::parse(&conversation_id)?;

    let summary = state
        .service
        .get_conversation(key)
        .await?
        .ok_or_else(|| ApiError::conversation_not_found(key))?;
    Ok(Json(summary))
}

/// Create the conversation routes router.
pub fn create_router(service: MessagingService) -> axum::Router {
    let state = Arc::new(ConversationState { service });

    axum::Router::new()
        .route("/user/:user_id", axum::routing::get(list_user_conversations))
        .route("/:conversation_id", axum::routing::get(get_conversation))
        .with_state(state)
}
