//! In-memory wide-column store.
//!
//! Reproduces the clustering and overwrite semantics of the real keyspace
//! with `BTreeMap` partitions, and carries a [`FaultInjector`] so callers
//! can exercise unavailability and rejected writes.

use crate::store::{IndexCursor, WideColumnStore};
use async_trait::async_trait;
use parley_core::{
    ConversationIndexEntry, ConversationKey, Message, MessageId, ParleyError, ParleyResult,
    StorageError, Table, UserId,
};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

type MessagePartition = BTreeMap<Reverse<MessageId>, Message>;
type IndexPartition = BTreeMap<IndexCursor, ConversationIndexEntry>;

// ============================================================================
// FAULT INJECTION
// ============================================================================

/// Scripted failures for an [`InMemoryStore`].
#[derive(Debug, Default)]
pub struct FaultInjector {
    unavailable: AtomicBool,
    table_write_failures: Mutex<HashMap<Table, u32>>,
    owner_index_failures: Mutex<HashMap<UserId, u32>>,
}

impl FaultInjector {
    /// Make every operation fail with `StorageError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Reject the next `count` writes to `table`.
    pub fn fail_next_writes(&self, table: Table, count: u32) {
        let mut failures = self
            .table_write_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *failures.entry(table).or_default() += count;
    }

    /// Reject the next `count` index writes whose owner is `owner_id`.
    pub fn fail_index_writes_for(&self, owner_id: UserId, count: u32) {
        let mut failures = self
            .owner_index_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *failures.entry(owner_id).or_default() += count;
    }

    /// Drop all scripted failures.
    pub fn reset(&self) {
        self.set_unavailable(false);
        self.table_write_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.owner_index_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn check_available(&self) -> ParleyResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "injected: store unreachable".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn check_write(&self, table: Table, owner_id: Option<UserId>) -> ParleyResult<()> {
        self.check_available()?;

        if take_one(&self.table_write_failures, &table) {
            return Err(write_failed(table, "injected: write rejected"));
        }
        if let Some(owner_id) = owner_id {
            if take_one(&self.owner_index_failures, &owner_id) {
                return Err(write_failed(table, &format!("injected: write rejected for owner {owner_id}")));
            }
        }
        Ok(())
    }
}

fn take_one<K: std::hash::Hash + Eq>(counters: &Mutex<HashMap<K, u32>>, key: &K) -> bool {
    let mut counters = counters.lock().unwrap_or_else(PoisonError::into_inner);
    match counters.get_mut(key) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            true
        }
        _ => false,
    }
}

fn write_failed(table: Table, reason: &str) -> ParleyError {
    StorageError::WriteFailed {
        table,
        reason: reason.to_string(),
    }
    .into()
}

fn poisoned<T>(_: PoisonError<T>) -> ParleyError {
    StorageError::LockPoisoned.into()
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Scan round-trips served.
    pub reads: u64,
    /// Rows written, including overwrites.
    pub writes: u64,
}

// ============================================================================
// STORE
// ============================================================================

/// In-memory [`WideColumnStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: RwLock<BTreeSet<UserId>>,
    messages: RwLock<HashMap<ConversationKey, MessagePartition>>,
    user_conversations: RwLock<HashMap<UserId, IndexPartition>>,
    faults: FaultInjector,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            reads: self.reads.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
        }
    }

    /// Number of known users.
    pub fn user_count(&self) -> ParleyResult<usize> {
        Ok(self.users.read().map_err(poisoned)?.len())
    }

    /// Number of message rows across all partitions.
    pub fn message_count(&self) -> ParleyResult<usize> {
        let messages = self.messages.read().map_err(poisoned)?;
        Ok(messages.values().map(BTreeMap::len).sum())
    }

    /// Number of physical index rows in `owner_id`'s partition.
    pub fn index_row_count(&self, owner_id: UserId) -> ParleyResult<usize> {
        let index = self.user_conversations.read().map_err(poisoned)?;
        Ok(index.get(&owner_id).map_or(0, BTreeMap::len))
    }

    /// Clear all stored data and counters.
    pub fn clear(&self) -> ParleyResult<()> {
        self.users.write().map_err(poisoned)?.clear();
        self.messages.write().map_err(poisoned)?.clear();
        self.user_conversations.write().map_err(poisoned)?.clear();
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl WideColumnStore for InMemoryStore {
    async fn user_insert(&self, user_id: UserId) -> ParleyResult<()> {
        self.faults.check_write(Table::Users, None)?;
        self.users.write().map_err(poisoned)?.insert(user_id);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn message_insert(&self, message: &Message) -> ParleyResult<()> {
        self.faults.check_write(Table::Messages, None)?;
        self.messages
            .write()
            .map_err(poisoned)?
            .entry(message.conversation_key)
            .or_default()
            .insert(Reverse(message.message_id), message.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn message_scan(
        &self,
        conversation_key: &ConversationKey,
        before: Option<MessageId>,
        limit: usize,
    ) -> ParleyResult<Vec<Message>> {
        self.faults.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);

        let messages = self.messages.read().map_err(poisoned)?;
        let Some(partition) = messages.get(conversation_key) else {
            return Ok(Vec::new());
        };
        let lower = match before {
            Some(before) => Bound::Excluded(Reverse(before)),
            None => Bound::Unbounded,
        };
        Ok(partition
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, message)| message.clone())
            .collect())
    }

    async fn message_get(
        &self,
        conversation_key: &ConversationKey,
        message_id: MessageId,
    ) -> ParleyResult<Option<Message>> {
        self.faults.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);

        let messages = self.messages.read().map_err(poisoned)?;
        Ok(messages
            .get(conversation_key)
            .and_then(|partition| partition.get(&Reverse(message_id)))
            .cloned())
    }

    async fn user_conversation_insert(&self, entry: &ConversationIndexEntry) -> ParleyResult<()> {
        self.faults
            .check_write(Table::UserConversations, Some(entry.owner_id))?;
        self.user_conversations
            .write()
            .map_err(poisoned)?
            .entry(entry.owner_id)
            .or_default()
            .insert(IndexCursor::of(entry), entry.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn user_conversation_scan(
        &self,
        owner_id: UserId,
        after: Option<IndexCursor>,
        limit: usize,
    ) -> ParleyResult<Vec<ConversationIndexEntry>> {
        self.faults.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);

        let index = self.user_conversations.read().map_err(poisoned)?;
        let Some(partition) = index.get(&owner_id) else {
            return Ok(Vec::new());
        };
        let lower = match after {
            Some(after) => Bound::Excluded(after),
            None => Bound::Unbounded,
        };
        Ok(partition
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::resolve;

    fn message(key: ConversationKey, ts: u64, text: &str) -> Message {
        let (lo, hi) = key.participants();
        Message {
            conversation_key: key,
            message_id: MessageId::from_parts(ts, 0, 1),
            sender_id: lo,
            recipient_id: hi,
            text: text.to_string(),
        }
    }

    fn entry(owner: UserId, peer: UserId, ts: u64, text: &str) -> ConversationIndexEntry {
        ConversationIndexEntry {
            owner_id: owner,
            peer_id: peer,
            conversation_key: resolve(owner, peer),
            last_message_id: MessageId::from_parts(ts, 0, 1),
            last_text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_message_scan_is_newest_first() {
        let store = InMemoryStore::new();
        let key = resolve(1, 2);
        for ts in [30, 10, 20] {
            store.message_insert(&message(key, ts, "m")).await.unwrap();
        }

        let rows = store.message_scan(&key, None, 10).await.unwrap();
        let times: Vec<u64> = rows.iter().map(|m| m.message_id.timestamp_ms()).collect();
        assert_eq!(times, vec![30, 20, 10]);
    }

    #[tokio::test]
    async fn test_message_scan_respects_before_and_limit() {
        let store = InMemoryStore::new();
        let key = resolve(1, 2);
        for ts in 1..=10 {
            store.message_insert(&message(key, ts, "m")).await.unwrap();
        }

        let before = MessageId::from_parts(6, 0, 1);
        let rows = store.message_scan(&key, Some(before), 3).await.unwrap();
        let times: Vec<u64> = rows.iter().map(|m| m.message_id.timestamp_ms()).collect();
        assert_eq!(times, vec![5, 4, 3]);
    }

    #[tokio::test]
    async fn test_message_scan_unknown_partition_is_empty() {
        let store = InMemoryStore::new();
        let rows = store.message_scan(&resolve(8, 9), None, 10).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_message_get_by_primary_key() {
        let store = InMemoryStore::new();
        let key = resolve(1, 2);
        store.message_insert(&message(key, 10, "hi")).await.unwrap();

        let id = MessageId::from_parts(10, 0, 1);
        let found = store.message_get(&key, id).await.unwrap().unwrap();
        assert_eq!(found.text, "hi");

        assert!(store.message_get(&resolve(1, 3), id).await.unwrap().is_none());
        let other = MessageId::from_parts(10, 0, 2);
        assert!(store.message_get(&key, other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_primary_key_overwrites() {
        let store = InMemoryStore::new();
        let row = entry(1, 2, 10, "hi");
        store.user_conversation_insert(&row).await.unwrap();
        store.user_conversation_insert(&row).await.unwrap();

        assert_eq!(store.index_row_count(1).unwrap(), 1);
        assert_eq!(store.stats().writes, 2);
    }

    #[tokio::test]
    async fn test_index_rows_append_per_message() {
        let store = InMemoryStore::new();
        store.user_conversation_insert(&entry(1, 2, 10, "hi")).await.unwrap();
        store.user_conversation_insert(&entry(1, 2, 20, "hey")).await.unwrap();

        assert_eq!(store.index_row_count(1).unwrap(), 2);
        let rows = store.user_conversation_scan(1, None, 10).await.unwrap();
        assert_eq!(rows[0].last_text, "hey");
    }

    #[tokio::test]
    async fn test_index_scan_resumes_after_cursor() {
        let store = InMemoryStore::new();
        for (peer, ts) in [(2, 10), (3, 30), (4, 20)] {
            store.user_conversation_insert(&entry(1, peer, ts, "m")).await.unwrap();
        }

        let first = store.user_conversation_scan(1, None, 2).await.unwrap();
        assert_eq!(first.iter().map(|e| e.peer_id).collect::<Vec<_>>(), vec![3, 4]);

        let cursor = IndexCursor::of(first.last().unwrap());
        let rest = store.user_conversation_scan(1, Some(cursor), 2).await.unwrap();
        assert_eq!(rest.iter().map(|e| e.peer_id).collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_everything() {
        let store = InMemoryStore::new();
        store.faults().set_unavailable(true);

        let key = resolve(1, 2);
        let write = store.message_insert(&message(key, 1, "m")).await;
        let read = store.message_scan(&key, None, 1).await;
        assert!(matches!(
            write,
            Err(ParleyError::Storage(StorageError::Unavailable { .. }))
        ));
        assert!(matches!(
            read,
            Err(ParleyError::Storage(StorageError::Unavailable { .. }))
        ));

        store.faults().reset();
        assert!(store.message_insert(&message(key, 1, "m")).await.is_ok());
    }

    #[tokio::test]
    async fn test_scripted_write_failures_are_consumed() {
        let store = InMemoryStore::new();
        store.faults().fail_next_writes(Table::Messages, 1);
        let key = resolve(1, 2);

        let first = store.message_insert(&message(key, 1, "m")).await;
        assert!(matches!(
            first,
            Err(ParleyError::Storage(StorageError::WriteFailed {
                table: Table::Messages,
                ..
            }))
        ));
        assert!(store.message_insert(&message(key, 1, "m")).await.is_ok());
        assert_eq!(store.message_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_owner_scoped_failures_only_hit_that_owner() {
        let store = InMemoryStore::new();
        store.faults().fail_index_writes_for(2, 1);

        assert!(store.user_conversation_insert(&entry(1, 2, 10, "m")).await.is_ok());
        assert!(store.user_conversation_insert(&entry(2, 1, 10, "m")).await.is_err());
        assert!(store.user_conversation_insert(&entry(2, 1, 10, "m")).await.is_ok());
    }

    #[tokio::test]
    async fn test_clear_resets_rows_and_counters() {
        let store = InMemoryStore::new();
        store.user_insert(1).await.unwrap();
        store.message_insert(&message(resolve(1, 2), 1, "m")).await.unwrap();
        store.clear().unwrap();

        assert_eq!(store.user_count().unwrap(), 0);
        assert_eq!(store.message_count().unwrap(), 0);
        assert_eq!(store.stats(), StoreStats::default());
    }
}
