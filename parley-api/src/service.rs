//! Messaging service.
//!
//! Composes the message log, the conversation index and the pagination
//! engine into the operations exposed by the HTTP layer. A send is complete
//! once the message row is written. Index writes the store rejects are
//! retried a bounded number of times; anything still missing, or missing
//! because the store was unreachable, is reported as a degraded fan-out.

use crate::types::{ConversationSummary, MessageRecord};
use parley_core::{
    id_from_time, resolve, validate_message_text, window_from_stream, ConversationIndexEntry,
    ConversationKey, CursorPage, Message, MessageId, MessageIdGenerator, Page, PageRequest,
    ParleyConfig, ParleyError, ParleyResult, Timestamp, UserId, ValidationError,
};
use parley_storage::{fan_out_entries, ConversationIndex, MessageStore, WideColumnStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// OUTCOMES
// ============================================================================

/// Index writes that did not land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFanOut {
    pub entries: Vec<ConversationIndexEntry>,
}

/// Result of the index fan-out that follows a message write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanOutStatus {
    /// Every participant's index row was written.
    Complete,
    /// The message is stored but some index rows are missing.
    Degraded {
        pending: PendingFanOut,
        error: ParleyError,
    },
}

impl FanOutStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, FanOutStatus::Complete)
    }

    pub fn pending(&self) -> Option<&PendingFanOut> {
        match self {
            FanOutStatus::Complete => None,
            FanOutStatus::Degraded { pending, .. } => Some(pending),
        }
    }
}

/// Result of a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub record: MessageRecord,
    pub fan_out: FanOutStatus,
}

// ============================================================================
// SERVICE
// ============================================================================

/// Two-party messaging over a wide-column store.
#[derive(Debug, Clone)]
pub struct MessagingService {
    store: Arc<dyn WideColumnStore>,
    messages: MessageStore,
    index: ConversationIndex,
    config: ParleyConfig,
}

impl MessagingService {
    /// Build a service over `store`. Fails if `config` is invalid.
    pub fn new(
        store: Arc<dyn WideColumnStore>,
        ids: Arc<MessageIdGenerator>,
        config: ParleyConfig,
    ) -> ParleyResult<Self> {
        config.validate()?;
        Ok(Self {
            messages: MessageStore::new(Arc::clone(&store), ids, config.scan_fetch_size),
            index: ConversationIndex::new(Arc::clone(&store), config.scan_fetch_size),
            store,
            config,
        })
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    pub fn index(&self) -> &ConversationIndex {
        &self.index
    }

    /// Record that a user exists.
    pub async fn register_user(&self, user_id: UserId) -> ParleyResult<()> {
        self.store.user_insert(user_id).await
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Send a message and fan it out to both participants' indexes.
    #[tracing::instrument(skip(self, text), fields(sender = sender_id, recipient = recipient_id))]
    pub async fn send_message(
        &self,
        sender_id: UserId,
        recipient_id: UserId,
        text: String,
    ) -> ParleyResult<SendOutcome> {
        validate_message_text(&text, self.config.max_message_len)?;
        let key = resolve(sender_id, recipient_id);
        let message = self
            .messages
            .append(key, sender_id, recipient_id, text)
            .await?;
        Ok(self.deliver(message).await)
    }

    /// Send a message stamped at a historical time.
    pub async fn send_message_at(
        &self,
        sender_id: UserId,
        recipient_id: UserId,
        text: String,
        at: Timestamp,
    ) -> ParleyResult<SendOutcome> {
        validate_message_text(&text, self.config.max_message_len)?;
        let key = resolve(sender_id, recipient_id);
        let message = self
            .messages
            .append_at(key, sender_id, recipient_id, text, at)
            .await?;
        Ok(self.deliver(message).await)
    }

    /// Re-drive index writes reported by a degraded send.
    ///
    /// Every entry must match the row a send of the stored message would
    /// have produced; otherwise nothing is written.
    #[tracing::instrument(skip_all, fields(entries = pending.entries.len()))]
    pub async fn repair_fan_out(&self, pending: &PendingFanOut) -> ParleyResult<FanOutStatus> {
        let mut entries = Vec::with_capacity(pending.entries.len());
        for entry in &pending.entries {
            entries.push(self.rebuild_entry(entry).await?);
        }

        let status = self.fan_out(entries).await;
        if status.is_complete() {
            info!("fan-out repaired");
        }
        Ok(status)
    }

    /// Rebuild `entry` from the message log.
    async fn rebuild_entry(&self, entry: &ConversationIndexEntry) -> ParleyResult<ConversationIndexEntry> {
        let invalid = |reason: &str| -> ParleyError {
            ValidationError::InvalidIndexEntry {
                owner_id: entry.owner_id,
                reason: reason.to_string(),
            }
            .into()
        };

        if entry.conversation_key.peer_of(entry.owner_id) != Some(entry.peer_id) {
            return Err(invalid("conversation key does not match owner and peer"));
        }
        let message = self
            .messages
            .get(entry.conversation_key, entry.last_message_id)
            .await?
            .ok_or_else(|| invalid("message not found"))?;
        let rebuilt = fan_out_entries(&message)
            .into_iter()
            .find(|row| row.owner_id == entry.owner_id)
            .ok_or_else(|| invalid("owner is not a participant of the message"))?;
        if rebuilt != *entry {
            return Err(invalid("entry does not match the stored message"));
        }
        Ok(rebuilt)
    }

    async fn deliver(&self, message: Message) -> SendOutcome {
        let fan_out = self.fan_out(fan_out_entries(&message)).await;
        SendOutcome {
            record: MessageRecord::from(message),
            fan_out,
        }
    }

    async fn fan_out(&self, entries: Vec<ConversationIndexEntry>) -> FanOutStatus {
        let mut pending = Vec::new();
        let mut last_error = None;

        for entry in entries {
            if let Err(error) = self.record_with_retry(&entry).await {
                warn!(
                    owner = entry.owner_id,
                    peer = entry.peer_id,
                    message_id = %entry.last_message_id,
                    %error,
                    "index fan-out failed"
                );
                pending.push(entry);
                last_error = Some(error);
            }
        }

        match last_error {
            None => FanOutStatus::Complete,
            Some(error) => FanOutStatus::Degraded {
                pending: PendingFanOut { entries: pending },
                error,
            },
        }
    }

    async fn record_with_retry(&self, entry: &ConversationIndexEntry) -> ParleyResult<()> {
        let retry = &self.config.fan_out_retry;
        let mut attempt = 0;
        loop {
            match self.index.record(entry).await {
                Ok(()) => return Ok(()),
                Err(error) if error.is_rejected_write() && attempt < retry.max_retries => {
                    attempt += 1;
                    let delay = retry.backoff_for(attempt);
                    debug!(attempt, ?delay, %error, "retrying index write");
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    // ========================================================================
    // READS
    // ========================================================================

    fn page_request(&self, page: i64, limit: i64) -> ParleyResult<PageRequest> {
        PageRequest::with_max_limit(page, limit, self.config.max_page_limit)
    }

    /// Messages of a conversation, newest first.
    #[tracing::instrument(skip(self), fields(conversation = %conversation_key))]
    pub async fn list_conversation_messages(
        &self,
        conversation_key: ConversationKey,
        page: i64,
        limit: i64,
    ) -> ParleyResult<Page<MessageRecord>> {
        let request = self.page_request(page, limit)?;
        let items = self.messages.collect_before(conversation_key, None).await?;
        Ok(Page::window(items, request).map(MessageRecord::from))
    }

    /// Messages of a conversation created strictly before `before`, newest first.
    #[tracing::instrument(skip(self), fields(conversation = %conversation_key))]
    pub async fn list_messages_before(
        &self,
        conversation_key: ConversationKey,
        before: Timestamp,
        page: i64,
        limit: i64,
    ) -> ParleyResult<Page<MessageRecord>> {
        let request = self.page_request(page, limit)?;
        let items = self
            .messages
            .collect_before(conversation_key, Some(id_from_time(before)))
            .await?;
        Ok(Page::window(items, request).map(MessageRecord::from))
    }

    /// A user's conversations, most recently active first.
    #[tracing::instrument(skip(self))]
    pub async fn list_user_conversations(
        &self,
        user_id: UserId,
        page: i64,
        limit: i64,
    ) -> ParleyResult<Page<ConversationSummary>> {
        let request = self.page_request(page, limit)?;
        let conversations = self.index.list_for_user(user_id).await?;
        Ok(Page::window(conversations.into_by_recency(), request).map(ConversationSummary::from))
    }

    /// Summary of one conversation, or `None` if it has no messages.
    ///
    /// Read from the lower participant's index and checked against the head of
    /// the message log, which wins when the index row is missing or behind.
    #[tracing::instrument(skip(self), fields(conversation = %conversation_key))]
    pub async fn get_conversation(
        &self,
        conversation_key: ConversationKey,
    ) -> ParleyResult<Option<ConversationSummary>> {
        let (owner, _) = conversation_key.participants();
        let conversations = self.index.list_for_user(owner).await?;
        let indexed = conversations.find(&conversation_key).cloned();
        let latest = self.messages.latest(conversation_key).await?;

        Ok(match (indexed, latest) {
            (Some(entry), Some(message)) if message.message_id > entry.last_message_id => {
                debug!(owner, "index row behind message log");
                Some(ConversationSummary::from(message))
            }
            (Some(entry), _) => Some(ConversationSummary::from(entry)),
            (None, Some(message)) => {
                debug!(owner, "index row missing, served from message log");
                Some(ConversationSummary::from(message))
            }
            (None, None) => None,
        })
    }

    /// Up to `limit` messages older than `before`, newest first, with a
    /// cursor for the next window.
    #[tracing::instrument(skip(self), fields(conversation = %conversation_key))]
    pub async fn scroll_messages(
        &self,
        conversation_key: ConversationKey,
        before: Option<MessageId>,
        limit: i64,
    ) -> ParleyResult<CursorPage<MessageRecord>> {
        let request = self.page_request(1, limit)?;
        let window = window_from_stream(
            self.messages.range_before(conversation_key, before),
            request.limit(),
            |message: &Message| message.message_id,
        )
        .await?;
        Ok(window.map(MessageRecord::from))
    }
}

// ============================================================================
// TESTS
// ============================================================================
