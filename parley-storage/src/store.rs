//! Store capability trait.
//!
//! Mirrors the persisted layout of the wide-column keyspace:
//!
//! - `messages`: partition `conversation_id`, clustering `message_id DESC`
//! - `user_conversations`: partition `user_id`, clustering
//!   `(last_message_time DESC, conversation_id ASC)`
//! - `users`: partition `user_id`
//!
//! The trait exposes exactly what that layout can serve efficiently:
//! point writes and bounded, clustering-ordered slices of one partition.
//! There is no offset, no secondary index and no cross-partition query.

use async_trait::async_trait;
use parley_core::{ConversationIndexEntry, ConversationKey, Message, MessageId, ParleyResult, UserId};
use std::cmp::Ordering;
use std::fmt;

/// Clustering position inside a `user_conversations` partition.
///
/// Orders the way the partition is clustered: newer message ids first, then
/// conversation keys ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexCursor {
    pub last_message_id: MessageId,
    pub conversation_key: ConversationKey,
}

impl IndexCursor {
    /// Position of `entry` within its owner's partition.
    pub fn of(entry: &ConversationIndexEntry) -> Self {
        Self {
            last_message_id: entry.last_message_id,
            conversation_key: entry.conversation_key,
        }
    }
}

impl Ord for IndexCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .last_message_id
            .cmp(&self.last_message_id)
            .then_with(|| self.conversation_key.cmp(&other.conversation_key))
    }
}

impl PartialOrd for IndexCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Async capability over the wide-column keyspace.
///
/// Implementations must never swallow a failure: transport problems surface
/// as `StorageError::Unavailable`, rejected writes as
/// `StorageError::WriteFailed`. Writes with an existing primary key
/// overwrite the row.
#[async_trait]
pub trait WideColumnStore: Send + Sync + fmt::Debug {
    // ========================================================================
    // USERS
    // ========================================================================

    /// Record that a user exists.
    async fn user_insert(&self, user_id: UserId) -> ParleyResult<()>;

    // ========================================================================
    // MESSAGES
    // ========================================================================

    /// Write one message row.
    async fn message_insert(&self, message: &Message) -> ParleyResult<()>;

    /// Slice of a conversation partition in clustering order (newest first).
    ///
    /// Only rows with `message_id < before` are returned when `before` is
    /// set. At most `limit` rows.
    async fn message_scan(
        &self,
        conversation_key: &ConversationKey,
        before: Option<MessageId>,
        limit: usize,
    ) -> ParleyResult<Vec<Message>>;

    /// Point lookup by full primary key.
    async fn message_get(
        &self,
        conversation_key: &ConversationKey,
        message_id: MessageId,
    ) -> ParleyResult<Option<Message>>;

    // ========================================================================
    // USER CONVERSATIONS
    // ========================================================================

    /// Write one index row keyed by `(owner, last_message_id, conversation_key)`.
    async fn user_conversation_insert(&self, entry: &ConversationIndexEntry) -> ParleyResult<()>;

    /// Slice of an owner's partition in clustering order.
    ///
    /// Only rows strictly after `after` are returned when it is set. At most
    /// `limit` rows.
    async fn user_conversation_scan(
        &self,
        owner_id: UserId,
        after: Option<IndexCursor>,
        limit: usize,
    ) -> ParleyResult<Vec<ConversationIndexEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::resolve;

    #[test]
    fn test_index_cursor_orders_newest_first() {
        let newer = IndexCursor {
            last_message_id: MessageId::from_parts(20, 0, 0),
            conversation_key: resolve(1, 9),
        };
        let older = IndexCursor {
            last_message_id: MessageId::from_parts(10, 0, 0),
            conversation_key: resolve(1, 2),
        };
        assert!(newer < older);
    }

    #[test]
    fn test_index_cursor_breaks_ties_by_key() {
        let id = MessageId::from_parts(10, 0, 0);
        let a = IndexCursor {
            last_message_id: id,
            conversation_key: resolve(1, 2),
        };
        let b = IndexCursor {
            last_message_id: id,
            conversation_key: resolve(1, 3),
        };
        assert!(a < b);
    }
}
