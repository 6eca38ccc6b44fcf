//! Per-conversation message log.
//!
//! Messages are appended to the conversation's partition and read back as a
//! lazy, newest-first stream that pages through the partition with the last
//! seen id as the cursor.

use crate::store::WideColumnStore;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use parley_core::{
    ConversationKey, Message, MessageId, MessageIdGenerator, ParleyError, ParleyResult, Timestamp,
    UserId,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Lazy newest-first sequence of messages. Dropping it cancels the scan.
pub type MessageStream = BoxStream<'static, ParleyResult<Message>>;

/// Append-only message log over a [`WideColumnStore`].
#[derive(Debug, Clone)]
pub struct MessageStore {
    store: Arc<dyn WideColumnStore>,
    ids: Arc<MessageIdGenerator>,
    fetch_size: usize,
}

impl MessageStore {
    /// `fetch_size` is the number of rows requested per store round-trip.
    pub fn new(store: Arc<dyn WideColumnStore>, ids: Arc<MessageIdGenerator>, fetch_size: u32) -> Self {
        Self {
            store,
            ids,
            fetch_size: (fetch_size as usize).max(1),
        }
    }

    pub fn ids(&self) -> &MessageIdGenerator {
        &self.ids
    }

    /// Append a message with a fresh id.
    #[tracing::instrument(skip(self, text), fields(conversation = %conversation_key))]
    pub async fn append(
        &self,
        conversation_key: ConversationKey,
        sender_id: UserId,
        recipient_id: UserId,
        text: String,
    ) -> ParleyResult<Message> {
        let message_id = self.ids.next_id();
        self.write(conversation_key, message_id, sender_id, recipient_id, text)
            .await
    }

    /// Append a message stamped at a historical time.
    pub async fn append_at(
        &self,
        conversation_key: ConversationKey,
        sender_id: UserId,
        recipient_id: UserId,
        text: String,
        at: Timestamp,
    ) -> ParleyResult<Message> {
        let message_id = self.ids.id_at(at);
        self.write(conversation_key, message_id, sender_id, recipient_id, text)
            .await
    }

    async fn write(
        &self,
        conversation_key: ConversationKey,
        message_id: MessageId,
        sender_id: UserId,
        recipient_id: UserId,
        text: String,
    ) -> ParleyResult<Message> {
        let message = Message {
            conversation_key,
            message_id,
            sender_id,
            recipient_id,
            text,
        };
        self.store.message_insert(&message).await?;
        debug!(message_id = %message.message_id, "message appended");
        Ok(message)
    }

    /// All messages of a conversation, newest first.
    ///
    /// With `before` set, only messages whose id is strictly less are
    /// yielded. The stream can be restarted by calling this again.
    pub fn range_before(
        &self,
        conversation_key: ConversationKey,
        before: Option<MessageId>,
    ) -> MessageStream {
        let state = ScanState {
            store: Arc::clone(&self.store),
            conversation_key,
            cursor: before,
            done: false,
        };
        let fetch_size = self.fetch_size;

        stream::try_unfold(state, move |mut state| async move {
            if state.done {
                return Ok(None);
            }

            let mut page = state
                .store
                .message_scan(&state.conversation_key, state.cursor, fetch_size)
                .await?;
            let fetched = page.len();
            debug!(
                conversation = %state.conversation_key,
                fetched,
                "scanned message partition"
            );
            reaffirm_descending(&state.conversation_key, state.cursor, &mut page);

            if fetched < fetch_size {
                state.done = true;
            }
            match page.last() {
                Some(last) => state.cursor = Some(last.message_id),
                None => state.done = true,
            }

            let rows = stream::iter(page.into_iter().map(Ok::<Message, ParleyError>));
            Ok::<_, ParleyError>(Some((rows, state)))
        })
        .try_flatten()
        .boxed()
    }

    /// One message by id.
    pub async fn get(
        &self,
        conversation_key: ConversationKey,
        message_id: MessageId,
    ) -> ParleyResult<Option<Message>> {
        self.store.message_get(&conversation_key, message_id).await
    }

    /// Newest message of a conversation, if any.
    pub async fn latest(&self, conversation_key: ConversationKey) -> ParleyResult<Option<Message>> {
        self.range_before(conversation_key, None).try_next().await
    }

    /// Materialize [`MessageStore::range_before`].
    pub async fn collect_before(
        &self,
        conversation_key: ConversationKey,
        before: Option<MessageId>,
    ) -> ParleyResult<Vec<Message>> {
        self.range_before(conversation_key, before)
            .try_collect()
            .await
    }
}

struct ScanState {
    store: Arc<dyn WideColumnStore>,
    conversation_key: ConversationKey,
    cursor: Option<MessageId>,
    done: bool,
}

/// Force one scanned page into strict descending order below `cursor`.
fn reaffirm_descending(
    conversation_key: &ConversationKey,
    cursor: Option<MessageId>,
    page: &mut Vec<Message>,
) {
    let ordered = page
        .windows(2)
        .all(|pair| pair[0].message_id > pair[1].message_id);
    if !ordered {
        warn!(conversation = %conversation_key, "store returned rows out of clustering order");
        page.sort_by(|a, b| b.message_id.cmp(&a.message_id));
        page.dedup_by_key(|m| m.message_id);
    }

    let scanned = page.len();
    page.retain(|m| {
        m.conversation_key == *conversation_key && cursor.map_or(true, |c| m.message_id < c)
    });
    if page.len() != scanned {
        warn!(
            conversation = %conversation_key,
            dropped = scanned - page.len(),
            "store returned rows outside the requested range"
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
