//! Error Types for the Parley API
//!
//! `ApiError` is the single error shape returned by every endpoint. It is
//! serialized as JSON with an HTTP status derived from its `ErrorCode`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parley_core::{ConfigError, ParleyError, StorageError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Page or limit outside the accepted range
    InvalidPagination,

    /// Conversation id is not of the form `{lo}_{hi}`
    InvalidConversationId,

    /// Message id is not a valid identifier
    InvalidMessageId,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested conversation does not exist
    ConversationNotFound,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// The backing store rejected a write or read
    StorageFailure,

    /// The backing store cannot be reached
    ServiceUnavailable,

    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput
            | ErrorCode::InvalidPagination
            | ErrorCode::InvalidConversationId
            | ErrorCode::InvalidMessageId => StatusCode::BAD_REQUEST,

            ErrorCode::ConversationNotFound => StatusCode::NOT_FOUND,

            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::StorageFailure | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::InvalidPagination => "Invalid pagination parameters",
            ErrorCode::InvalidConversationId => "Invalid conversation id",
            ErrorCode::InvalidMessageId => "Invalid message id",
            ErrorCode::ConversationNotFound => "Conversation not found",
            ErrorCode::StorageFailure => "Storage operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn conversation_not_found(conversation_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ConversationNotFound,
            format!("Conversation {} not found", conversation_id),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<ParleyError> for ApiError {
    fn from(err: ParleyError) -> Self {
        let retryable = err.is_retryable();
        let api_error = match &err {
            ParleyError::Validation(validation) => match validation {
                ValidationError::InvalidPagination { page, limit, .. } => {
                    ApiError::new(ErrorCode::InvalidPagination, validation.to_string())
                        .with_details(serde_json::json!({ "page": page, "limit": limit }))
                }
                ValidationError::InvalidConversationKey { .. } => {
                    ApiError::new(ErrorCode::InvalidConversationId, validation.to_string())
                }
                ValidationError::InvalidMessageId { .. } => {
                    ApiError::new(ErrorCode::InvalidMessageId, validation.to_string())
                }
                ValidationError::EmptyMessage
                | ValidationError::MessageTooLong { .. }
                | ValidationError::InvalidIndexEntry { .. } => {
                    ApiError::invalid_input(validation.to_string())
                }
            },
            ParleyError::Storage(storage) => {
                tracing::error!(error = %storage, "storage error");
                match storage {
                    StorageError::Unavailable { .. } => {
                        ApiError::from_code(ErrorCode::ServiceUnavailable)
                    }
                    StorageError::WriteFailed { .. } => {
                        ApiError::from_code(ErrorCode::StorageFailure)
                    }
                    StorageError::LockPoisoned => ApiError::from_code(ErrorCode::InternalError),
                }
            }
            ParleyError::Config(config) => {
                tracing::error!(error = %config, "configuration error");
                match config {
                    ConfigError::MissingRequired { .. } | ConfigError::InvalidValue { .. } => {
                        ApiError::internal_error(config.to_string())
                    }
                }
            }
        };

        if retryable {
            api_error.with_details(serde_json::json!({ "retryable": true }))
        } else {
            api_error
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
