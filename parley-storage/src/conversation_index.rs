//! Per-user conversation index.
//!
//! Every message produces one index row per participant. Rows are never
//! updated in place; each message appends a new row under its own id, and
//! reads collapse the owner's partition to the newest row per peer.

use crate::store::{IndexCursor, WideColumnStore};
use parley_core::{ConversationIndexEntry, ConversationKey, Message, MessageId, ParleyResult, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Index rows a message fans out to: the sender's view, then the recipient's.
///
/// A message a user sends to themself produces a single row.
pub fn fan_out_entries(message: &Message) -> Vec<ConversationIndexEntry> {
    let sender_view = ConversationIndexEntry {
        owner_id: message.sender_id,
        peer_id: message.recipient_id,
        conversation_key: message.conversation_key,
        last_message_id: message.message_id,
        last_text: message.text.clone(),
    };
    if message.sender_id == message.recipient_id {
        return vec![sender_view];
    }

    let recipient_view = ConversationIndexEntry {
        owner_id: message.recipient_id,
        peer_id: message.sender_id,
        ..sender_view.clone()
    };
    vec![sender_view, recipient_view]
}

/// Read/write access to the `user_conversations` projection.
#[derive(Debug, Clone)]
pub struct ConversationIndex {
    store: Arc<dyn WideColumnStore>,
    fetch_size: usize,
}

impl ConversationIndex {
    pub fn new(store: Arc<dyn WideColumnStore>, fetch_size: u32) -> Self {
        Self {
            store,
            fetch_size: (fetch_size as usize).max(1),
        }
    }

    /// Record `owner`'s latest activity with `peer`.
    ///
    /// Writing the same `(owner, message_id, key)` again overwrites the row.
    pub async fn record_activity(
        &self,
        owner_id: UserId,
        peer_id: UserId,
        conversation_key: ConversationKey,
        message_id: MessageId,
        last_text: &str,
    ) -> ParleyResult<ConversationIndexEntry> {
        let entry = ConversationIndexEntry {
            owner_id,
            peer_id,
            conversation_key,
            last_message_id: message_id,
            last_text: last_text.to_string(),
        };
        self.record(&entry).await?;
        Ok(entry)
    }

    /// Write a prepared entry.
    pub async fn record(&self, entry: &ConversationIndexEntry) -> ParleyResult<()> {
        self.store.user_conversation_insert(entry).await?;
        debug!(
            owner = entry.owner_id,
            peer = entry.peer_id,
            message_id = %entry.last_message_id,
            "index row written"
        );
        Ok(())
    }

    /// Latest entry per peer for `owner_id`.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_user(&self, owner_id: UserId) -> ParleyResult<UserConversations> {
        let mut latest: HashMap<UserId, ConversationIndexEntry> = HashMap::new();
        let mut cursor: Option<IndexCursor> = None;
        let mut rows = 0usize;

        loop {
            let page = self
                .store
                .user_conversation_scan(owner_id, cursor, self.fetch_size)
                .await?;
            let fetched = page.len();
            rows += fetched;

            let next = page.last().map(IndexCursor::of);
            for entry in page {
                if entry.owner_id != owner_id {
                    warn!(owner = owner_id, row_owner = entry.owner_id, "foreign row in index partition");
                    continue;
                }
                collapse(&mut latest, entry);
            }

            if fetched < self.fetch_size {
                break;
            }
            match (cursor, next) {
                (Some(prev), Some(next)) if next <= prev => {
                    warn!(owner = owner_id, "index scan cursor did not advance");
                    break;
                }
                (_, None) => break,
                (_, next) => cursor = next,
            }
        }

        debug!(owner = owner_id, rows, peers = latest.len(), "collapsed index partition");
        Ok(UserConversations {
            owner_id,
            entries: latest,
        })
    }
}

/// Keep the newest entry per peer. On equal ids the later-read row wins.
fn collapse(latest: &mut HashMap<UserId, ConversationIndexEntry>, entry: ConversationIndexEntry) {
    match latest.get(&entry.peer_id) {
        Some(current) if entry.last_message_id < current.last_message_id => {}
        _ => {
            latest.insert(entry.peer_id, entry);
        }
    }
}

/// One user's conversations, collapsed to the latest entry per peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserConversations {
    owner_id: UserId,
    entries: HashMap<UserId, ConversationIndexEntry>,
}

impl UserConversations {
    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn get(&self, peer_id: UserId) -> Option<&ConversationIndexEntry> {
        self.entries.get(&peer_id)
    }

    /// Entry for the conversation identified by `key`, if the owner has one.
    pub fn find(&self, key: &ConversationKey) -> Option<&ConversationIndexEntry> {
        key.peer_of(self.owner_id)
            .and_then(|peer| self.entries.get(&peer))
            .filter(|entry| entry.conversation_key == *key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered newest first, ties broken by peer id ascending.
    pub fn by_recency(&self) -> Vec<&ConversationIndexEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|a, b| {
            b.last_message_id
                .cmp(&a.last_message_id)
                .then_with(|| a.peer_id.cmp(&b.peer_id))
        });
        entries
    }

    /// Owned form of [`UserConversations::by_recency`].
    pub fn into_by_recency(self) -> Vec<ConversationIndexEntry> {
        let mut entries: Vec<_> = self.entries.into_values().collect();
        entries.sort_by(|a, b| {
            b.last_message_id
                .cmp(&a.last_message_id)
                .then_with(|| a.peer_id.cmp(&b.peer_id))
        });
        entries
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use parley_core::resolve;
    use proptest::prelude::*;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// One entry per peer, and it carries the greatest id recorded for that peer.
        #[test]
        fn prop_list_for_user_keeps_latest_per_peer(
            writes in prop::collection::vec((1i64..6, 0u64..1_000), 0..60),
            fetch_size in 1u32..8,
        ) {
            let store = Arc::new(InMemoryStore::new());
            let index = ConversationIndex::new(store, fetch_size);
            let owner = 100;

            let convs = runtime().block_on(async {
                for (peer, ts) in &writes {
                    index
                        .record_activity(owner, *peer, resolve(owner, *peer), MessageId::from_parts(*ts, 0, 1), "m")
                        .await
                        .unwrap();
                }
                index.list_for_user(owner).await.unwrap()
            });

            let mut expected: HashMap<UserId, u64> = HashMap::new();
            for (peer, ts) in &writes {
                let slot = expected.entry(*peer).or_insert(*ts);
                *slot = (*slot).max(*ts);
            }

            prop_assert_eq!(convs.len(), expected.len());
            for (peer, ts) in expected {
                let entry = convs.get(peer).unwrap();
                prop_assert_eq!(entry.last_message_id.timestamp_ms(), ts);
            }
        }
    }
}
