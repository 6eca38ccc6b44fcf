//! Parley Core - Identity, Entities and Pagination
//!
//! Pure data types and functions shared by every Parley crate: time-ordered
//! message ids, canonical conversation keys, the message and index entities,
//! the offset-free pagination engine, errors and configuration.
//! Nothing in this crate performs I/O.

pub mod config;
pub mod conversation;
pub mod entities;
pub mod error;
pub mod identity;
pub mod pagination;

use chrono::{DateTime, Utc};

/// Raw user identifier. Not validated against any user directory.
pub type UserId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use config::{ParleyConfig, RetryConfig};
pub use conversation::{resolve, ConversationKey};
pub use entities::{ConversationIndexEntry, Message};
pub use error::{ConfigError, ParleyError, ParleyResult, StorageError, Table, ValidationError};
pub use identity::{
    id_from_time, time_from_id, Clock, ManualClock, MessageId, MessageIdGenerator, SystemClock,
    MAX_COUNTER, MAX_NODE, MAX_TIMESTAMP_MS,
};
pub use pagination::{paginate, window_from_stream, CursorPage, Page, PageRequest};

/// Validate message text against the configured maximum length.
pub fn validate_message_text(text: &str, max_len: usize) -> ParleyResult<()> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyMessage.into());
    }
    let len = text.chars().count();
    if len > max_len {
        return Err(ValidationError::MessageTooLong { len, max: max_len }.into());
    }
    Ok(())
}
