//! Error types for Parley operations

use crate::UserId;
use thiserror::Error;

/// Logical tables owned by the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Messages,
    UserConversations,
}

impl Table {
    /// Table name as it appears in the keyspace.
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Messages => "messages",
            Table::UserConversations => "user_conversations",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Write to {table} failed: {reason}")]
    WriteFailed { table: Table, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid pagination (page {page}, limit {limit}): {reason}")]
    InvalidPagination { page: i64, limit: i64, reason: String },

    #[error("Invalid conversation key {key:?}: {reason}")]
    InvalidConversationKey { key: String, reason: String },

    #[error("Invalid message id: {value:?}")]
    InvalidMessageId { value: String },

    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Message text too long: {len} characters, max {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("Invalid index entry for owner {owner_id}: {reason}")]
    InvalidIndexEntry { owner_id: UserId, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Parley errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParleyError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl ParleyError {
    /// Whether re-issuing the same operation may succeed.
    ///
    /// Transport and write failures are retryable; validation and config
    /// errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ParleyError::Storage(
                StorageError::Unavailable { .. } | StorageError::WriteFailed { .. }
            )
        )
    }

    /// Whether the store received the write and rejected it.
    ///
    /// Only these are re-issued locally; an unreachable store is reported
    /// to the caller as is.
    pub fn is_rejected_write(&self) -> bool {
        matches!(self, ParleyError::Storage(StorageError::WriteFailed { .. }))
    }
}

/// Result type alias for Parley operations.
pub type ParleyResult<T> = Result<T, ParleyError>;

// =============================================================================
// TESTS
// =============================================================================
