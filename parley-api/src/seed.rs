//! Test-data generation.
//!
//! Creates users `1..=N` and `M` distinct conversations between random user
//! pairs, each holding a random number of messages one minute apart that
//! alternate between the two participants. Everything is written through
//! [`MessagingService`], so the conversation index is populated exactly as
//! live traffic would populate it.

use crate::service::MessagingService;
use chrono::Duration;
use parley_core::{
    ConfigError, ConversationIndexEntry, ConversationKey, Message, MessageId, ParleyError,
    ParleyResult, Timestamp, UserId,
};
use parley_storage::fan_out_entries;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use tracing::{info, warn};

/// Shape of the generated data set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    pub users: u32,
    pub conversations: u32,
    /// Every conversation gets between 5 and this many messages.
    pub max_messages_per_conversation: u32,
    /// Conversations start up to this many days before `now`.
    pub max_age_days: u32,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            users: 10,
            conversations: 15,
            max_messages_per_conversation: 50,
            max_age_days: 30,
        }
    }
}

const MIN_MESSAGES_PER_CONVERSATION: u32 = 5;

impl SeedConfig {
    pub fn validate(&self) -> ParleyResult<()> {
        if self.users < 2 {
            return Err(invalid("users", self.users, "need at least two users"));
        }
        let possible = u64::from(self.users) * u64::from(self.users - 1) / 2;
        if u64::from(self.conversations) > possible {
            return Err(invalid(
                "conversations",
                self.conversations,
                &format!("at most {possible} distinct pairs exist"),
            ));
        }
        if self.max_messages_per_conversation < MIN_MESSAGES_PER_CONVERSATION {
            return Err(invalid(
                "max_messages_per_conversation",
                self.max_messages_per_conversation,
                "must be at least 5",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: u32, reason: &str) -> ParleyError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededUser {
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededMessage {
    pub conversation_id: ConversationKey,
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub timestamp: Timestamp,
    pub text: String,
}

/// Everything that was written, in write order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub users: Vec<SeededUser>,
    /// One row per index write, two per message.
    pub conversations: Vec<ConversationIndexEntry>,
    pub messages: Vec<SeededMessage>,
}

impl SeedReport {
    /// Distinct conversation keys in the report.
    pub fn conversation_keys(&self) -> BTreeSet<ConversationKey> {
        self.messages.iter().map(|m| m.conversation_id).collect()
    }

    /// Write `users.json`, `conversations.json` and `messages.json` into `dir`.
    pub fn export(&self, dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(dir)?;
        write_json(&dir.join("users.json"), &self.users)?;
        write_json(&dir.join("conversations.json"), &self.conversations)?;
        write_json(&dir.join("messages.json"), &self.messages)?;
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value).map_err(io::Error::other)
}

// ============================================================================
// GENERATION
// ============================================================================

/// Populate `service` according to `config`.
#[tracing::instrument(skip(service, rng))]
pub async fn seed<R>(
    service: &MessagingService,
    config: &SeedConfig,
    rng: &mut R,
    now: Timestamp,
) -> ParleyResult<SeedReport>
where
    R: Rng + Send,
{
    config.validate()?;
    let mut report = SeedReport::default();

    for user_id in 1..=UserId::from(config.users) {
        service.register_user(user_id).await?;
        report.users.push(SeededUser { user_id });
    }
    info!(users = config.users, "users created");

    let mut used_pairs = BTreeSet::new();
    while used_pairs.len() < config.conversations as usize {
        let sender_id = rng.random_range(1..=UserId::from(config.users));
        let receiver_id = rng.random_range(1..=UserId::from(config.users));
        if sender_id == receiver_id {
            continue;
        }
        let key = ConversationKey::resolve(sender_id, receiver_id);
        if !used_pairs.insert(key) {
            continue;
        }

        let count =
            rng.random_range(MIN_MESSAGES_PER_CONVERSATION..=config.max_messages_per_conversation);
        let age_days = rng.random_range(0..=config.max_age_days);
        let start = now - Duration::days(i64::from(age_days));

        for i in 0..count {
            let at = start + Duration::minutes(i64::from(i));
            let (from, to) = if i % 2 == 0 {
                (sender_id, receiver_id)
            } else {
                (receiver_id, sender_id)
            };
            let text = format!("Message {} from {} to {}", i + 1, from, to);

            let outcome = service.send_message_at(from, to, text, at).await?;
            if let Some(pending) = outcome.fan_out.pending() {
                warn!(
                    conversation = %key,
                    missing = pending.entries.len(),
                    "seeded message has incomplete index fan-out"
                );
            }

            let record = outcome.record;
            let written = fan_out_entries(&Message::from(record.clone()))
                .into_iter()
                .filter(|entry| {
                    outcome
                        .fan_out
                        .pending()
                        .map_or(true, |pending| !pending.entries.contains(entry))
                });
            report.conversations.extend(written);
            report.messages.push(SeededMessage {
                conversation_id: record.conversation_id,
                message_id: record.id,
                sender_id: record.sender_id,
                receiver_id: record.recipient_id,
                timestamp: record.created_at,
                text: record.content,
            });
        }
    }

    info!(
        conversations = config.conversations,
        messages = report.messages.len(),
        "test data generated"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use parley_core::{MessageIdGenerator, ParleyConfig};
    use parley_storage::InMemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn service() -> (Arc<InMemoryStore>, MessagingService) {
        let store = Arc::new(InMemoryStore::new());
        let service = MessagingService::new(
            store.clone(),
            Arc::new(MessageIdGenerator::system()),
            ParleyConfig::default(),
        )
        .unwrap();
        (store, service)
    }

    #[test]
    fn test_config_rejects_impossible_shapes() {
        let too_few_users = SeedConfig {
            users: 1,
            ..SeedConfig::default()
        };
        assert!(too_few_users.validate().is_err());

        let too_many_pairs = SeedConfig {
            users: 3,
            conversations: 4,
            ..SeedConfig::default()
        };
        assert!(too_many_pairs.validate().is_err());
        assert!(SeedConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_seed_writes_consistent_data() {
        let (store, service) = service();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let config = SeedConfig {
            users: 6,
            conversations: 8,
            max_messages_per_conversation: 12,
            max_age_days: 30,
        };
        let mut rng = StdRng::seed_from_u64(7);

        let report = seed(&service, &config, &mut rng, now).await.unwrap();

        assert_eq!(report.users.len(), 6);
        assert_eq!(report.conversation_keys().len(), 8);
        assert_eq!(store.user_count().unwrap(), 6);
        assert_eq!(store.message_count().unwrap(), report.messages.len());
        assert_eq!(report.conversations.len(), report.messages.len() * 2);

        for key in report.conversation_keys() {
            let in_conversation: Vec<_> = report
                .messages
                .iter()
                .filter(|m| m.conversation_id == key)
                .collect();
            assert!((5..=12).contains(&in_conversation.len()));
            assert!(in_conversation[0].text.starts_with("Message 1 from "));
            assert!(in_conversation.iter().all(|m| m.timestamp <= now));
            assert!(in_conversation
                .windows(2)
                .all(|w| w[1].timestamp - w[0].timestamp == Duration::minutes(1)));
            assert!(in_conversation
                .windows(2)
                .all(|w| w[0].sender_id == w[1].receiver_id));
        }
    }

    #[tokio::test]
    async fn test_seeded_index_shows_last_message() {
        let (_, service) = service();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let config = SeedConfig {
            users: 2,
            conversations: 1,
            max_messages_per_conversation: 5,
            max_age_days: 0,
        };
        let report = seed(&service, &config, &mut StdRng::seed_from_u64(1), now)
            .await
            .unwrap();

        let last = report.messages.last().unwrap();
        let page = service.list_user_conversations(1, 1, 20).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].last_message_content, last.text);
        assert_eq!(last.text, format!("Message 5 from {} to {}", last.sender_id, last.receiver_id));
    }
}
