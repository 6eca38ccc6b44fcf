//! Request and response types for the messaging API.

use crate::service::{FanOutStatus, PendingFanOut};
use parley_core::{
    ConversationIndexEntry, ConversationKey, Message, MessageId, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// MESSAGES
// ============================================================================

/// A message as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub sender_id: UserId,
    #[serde(rename = "receiver_id")]
    pub recipient_id: UserId,
    pub created_at: Timestamp,
    pub conversation_id: ConversationKey,
    pub content: String,
}

impl From<Message> for MessageRecord {
    fn from(message: Message) -> Self {
        Self {
            id: message.message_id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            created_at: message.created_at(),
            conversation_id: message.conversation_key,
            content: message.text,
        }
    }
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            conversation_key: record.conversation_id,
            message_id: record.id,
            sender_id: record.sender_id,
            recipient_id: record.recipient_id,
            text: record.content,
        }
    }
}

/// Request to send a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
}

/// Outcome of the index fan-out as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FanOutReport {
    Complete,
    Degraded { pending: PendingFanOut, error: String },
}

impl From<&FanOutStatus> for FanOutReport {
    fn from(status: &FanOutStatus) -> Self {
        match status {
            FanOutStatus::Complete => FanOutReport::Complete,
            FanOutStatus::Degraded { pending, error } => FanOutReport::Degraded {
                pending: pending.clone(),
                error: error.to_string(),
            },
        }
    }
}

/// Response to a send: the stored message plus the fan-out outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    #[serde(flatten)]
    pub message: MessageRecord,
    pub fan_out: FanOutReport,
}

// ============================================================================
// CONVERSATIONS
// ============================================================================

/// A conversation as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationKey,
    pub user1_id: UserId,
    pub user2_id: UserId,
    pub last_message_content: String,
    pub last_message_at: Timestamp,
}

impl From<ConversationIndexEntry> for ConversationSummary {
    fn from(entry: ConversationIndexEntry) -> Self {
        let (user1_id, user2_id) = entry.conversation_key.participants();
        Self {
            id: entry.conversation_key,
            user1_id,
            user2_id,
            last_message_at: entry.last_message_at(),
            last_message_content: entry.last_text,
        }
    }
}

impl From<Message> for ConversationSummary {
    fn from(message: Message) -> Self {
        let (user1_id, user2_id) = message.conversation_key.participants();
        Self {
            id: message.conversation_key,
            user1_id,
            user2_id,
            last_message_at: message.created_at(),
            last_message_content: message.text,
        }
    }
}

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

/// `page` / `limit` query parameters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Query parameters of the "messages before" listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeforeParams {
    pub before_timestamp: Timestamp,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Query parameters of cursor scrolling.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScrollParams {
    pub before: Option<MessageId>,
    pub limit: Option<i64>,
}
