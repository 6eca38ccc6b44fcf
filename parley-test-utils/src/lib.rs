//! Parley Test Utilities
//!
//! Shared test infrastructure for the Parley workspace:
//! - Proptest generators for ids, user pairs and message text
//! - Fixtures that wire a `MessagingService` over an in-memory store
//! - Assertions for Parley-specific error shapes

pub use parley_storage::{FaultInjector, InMemoryStore};

pub use parley_core::{
    resolve, ConversationKey, ManualClock, Message, MessageId, MessageIdGenerator, ParleyConfig,
    ParleyError, ParleyResult, RetryConfig, StorageError, Timestamp, UserId, ValidationError,
};

pub use parley_api::{MessagingService, SendOutcome};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Parley inputs.

    use super::*;
    use proptest::prelude::*;

    /// Small positive user ids, so pairs collide often.
    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        1i64..=50
    }

    /// Two distinct users.
    pub fn arb_user_pair() -> impl Strategy<Value = (UserId, UserId)> {
        (arb_user_id(), arb_user_id()).prop_filter("distinct users", |(a, b)| a != b)
    }

    /// Non-blank message text.
    pub fn arb_message_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ]{0,40}[a-zA-Z0-9]"
    }

    /// A message id with an arbitrary timestamp, counter and node.
    pub fn arb_message_id() -> impl Strategy<Value = MessageId> {
        (
            0u64..=parley_core::MAX_TIMESTAMP_MS,
            0u16..=parley_core::MAX_COUNTER,
            0u64..=parley_core::MAX_NODE,
        )
            .prop_map(|(ms, counter, node)| MessageId::from_parts(ms, counter, node))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-wired services for common scenarios.

    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    /// A service over a fresh in-memory store, driven by a manual clock.
    pub struct TestService {
        pub store: Arc<InMemoryStore>,
        pub clock: Arc<ManualClock>,
        pub service: MessagingService,
    }

    /// Fixed instant all fixtures start from.
    pub fn epoch() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Default configuration with fan-out retries disabled.
    pub fn no_retry_config() -> ParleyConfig {
        ParleyConfig {
            fan_out_retry: RetryConfig::none(),
            ..ParleyConfig::default()
        }
    }

    /// Build a service with `config`.
    pub fn test_service_with(config: ParleyConfig) -> TestService {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(epoch()));
        let ids = Arc::new(MessageIdGenerator::new(clock.clone()));
        let service = match MessagingService::new(store.clone(), ids, config) {
            Ok(service) => service,
            Err(e) => panic!("invalid test config: {e}"),
        };
        TestService {
            store,
            clock,
            service,
        }
    }

    /// Build a service with the default configuration.
    pub fn test_service() -> TestService {
        test_service_with(ParleyConfig::default())
    }

    /// Send `count` messages between `a` and `b`, alternating senders and
    /// advancing the clock one second after each. Returns the texts in send
    /// order.
    pub async fn seeded_conversation(
        fixture: &TestService,
        a: UserId,
        b: UserId,
        count: usize,
    ) -> Vec<String> {
        let mut texts = Vec::with_capacity(count);
        for i in 0..count {
            let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
            let text = format!("message {i}");
            if let Err(e) = fixture.service.send_message(from, to, text.clone()).await {
                panic!("seeded send failed: {e}");
            }
            fixture.clock.advance(Duration::seconds(1));
            texts.push(text);
        }
        texts
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Parley error shapes.

    use super::*;

    /// Assert that a result is an invalid-pagination validation error.
    #[track_caller]
    pub fn assert_invalid_pagination<T: std::fmt::Debug>(result: &ParleyResult<T>) {
        match result {
            Err(ParleyError::Validation(ValidationError::InvalidPagination { .. })) => {}
            other => panic!("Expected InvalidPagination, got: {:?}", other),
        }
    }

    /// Assert that a result is a rejected index entry.
    #[track_caller]
    pub fn assert_invalid_index_entry<T: std::fmt::Debug>(result: &ParleyResult<T>) {
        match result {
            Err(ParleyError::Validation(ValidationError::InvalidIndexEntry { .. })) => {}
            other => panic!("Expected InvalidIndexEntry, got: {:?}", other),
        }
    }

    /// Assert that `ids` are strictly descending.
    #[track_caller]
    pub fn assert_newest_first(ids: &[MessageId]) {
        for pair in ids.windows(2) {
            assert!(
                pair[0] > pair[1],
                "Expected newest first, got {} before {}",
                pair[0],
                pair[1]
            );
        }
    }
}
