//! Core entity structures

use crate::{ConversationKey, MessageId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A message in a two-party conversation.
///
/// Immutable once written. There is no separate creation timestamp; the
/// time is carried by `message_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub conversation_key: ConversationKey,
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub text: String,
}

impl Message {
    pub fn created_at(&self) -> Timestamp {
        self.message_id.timestamp()
    }
}

/// One user's view of the latest activity with one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationIndexEntry {
    pub owner_id: UserId,
    pub peer_id: UserId,
    pub conversation_key: ConversationKey,
    pub last_message_id: MessageId,
    /// Denormalized copy of the last message's text.
    pub last_text: String,
}

impl ConversationIndexEntry {
    pub fn last_message_at(&self) -> Timestamp {
        self.last_message_id.timestamp()
    }
}
