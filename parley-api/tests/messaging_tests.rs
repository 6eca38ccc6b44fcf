//! End-to-end messaging scenarios against the in-memory store.

use chrono::Duration;
use parley_api::{FanOutStatus, MessagingService, PendingFanOut};
use parley_core::{id_from_time, resolve, Clock, ConversationIndexEntry, ParleyResult};
use parley_test_utils::assertions::{
    assert_invalid_index_entry, assert_invalid_pagination, assert_newest_first,
};
use parley_test_utils::fixtures::{
    no_retry_config, seeded_conversation, test_service, test_service_with,
};
use parley_test_utils::generators::{arb_message_id, arb_message_text, arb_user_pair};
use proptest::prelude::*;

#[tokio::test]
async fn reply_becomes_last_message_for_both_participants() -> ParleyResult<()> {
    let f = test_service();
    f.service.send_message(1, 2, "hi".to_string()).await?;
    f.clock.advance(Duration::seconds(1));
    f.service.send_message(2, 1, "hey".to_string()).await?;

    for user in [1, 2] {
        let page = f.service.list_user_conversations(user, 1, 20).await?;
        assert_eq!(page.total, 1);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].last_message_content, "hey");
        assert_eq!(page.data[0].id, resolve(1, 2));
    }
    Ok(())
}

#[tokio::test]
async fn twenty_five_messages_split_across_two_pages() -> ParleyResult<()> {
    let f = test_service();
    let texts = seeded_conversation(&f, 1, 2, 25).await;
    let key = resolve(1, 2);

    let first = f.service.list_conversation_messages(key, 1, 20).await?;
    let second = f.service.list_conversation_messages(key, 2, 20).await?;

    assert_eq!(first.total, 25);
    assert_eq!(second.total, 25);
    assert_eq!(first.data.len(), 20);
    assert_eq!(second.data.len(), 5);

    let newest_first: Vec<String> = texts.into_iter().rev().collect();
    let listed: Vec<String> = first
        .data
        .iter()
        .chain(second.data.iter())
        .map(|m| m.content.clone())
        .collect();
    assert_eq!(listed, newest_first);

    let ids: Vec<_> = first.data.iter().chain(second.data.iter()).map(|m| m.id).collect();
    assert_newest_first(&ids);

    let beyond = f.service.list_conversation_messages(key, 3, 20).await?;
    assert_eq!(beyond.total, 25);
    assert!(beyond.data.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_first_sends_share_one_conversation() -> ParleyResult<()> {
    let f = test_service();

    let forward = spawn_send(f.service.clone(), 1, 2, "from one");
    let backward = spawn_send(f.service.clone(), 2, 1, "from two");
    let (a, b) = (join(forward).await?, join(backward).await?);

    assert_eq!(a.record.conversation_id, b.record.conversation_id);
    assert_ne!(a.record.id, b.record.id);

    let messages = f
        .service
        .list_conversation_messages(resolve(1, 2), 1, 20)
        .await?;
    assert_eq!(messages.total, 2);

    for user in [1, 2] {
        let conversations = f.service.list_user_conversations(user, 1, 20).await?;
        assert_eq!(conversations.total, 1);
    }
    Ok(())
}

fn spawn_send(
    service: MessagingService,
    from: i64,
    to: i64,
    text: &'static str,
) -> tokio::task::JoinHandle<ParleyResult<parley_api::SendOutcome>> {
    tokio::spawn(async move { service.send_message(from, to, text.to_string()).await })
}

async fn join(
    handle: tokio::task::JoinHandle<ParleyResult<parley_api::SendOutcome>>,
) -> ParleyResult<parley_api::SendOutcome> {
    match handle.await {
        Ok(result) => result,
        Err(e) => panic!("send task failed: {e}"),
    }
}

#[tokio::test]
async fn conversations_are_listed_most_recent_first() -> ParleyResult<()> {
    let f = test_service();
    for peer in [2, 3, 4] {
        f.service.send_message(1, peer, format!("to {peer}")).await?;
        f.clock.advance(Duration::seconds(1));
    }
    f.service.send_message(2, 1, "back again".to_string()).await?;

    let page = f.service.list_user_conversations(1, 1, 20).await?;
    let order: Vec<String> = page.data.iter().map(|c| c.id.to_string()).collect();
    assert_eq!(order, vec!["1_2", "1_4", "1_3"]);
    assert_eq!(page.data[0].last_message_content, "back again");
    Ok(())
}

#[tokio::test]
async fn messages_before_excludes_the_boundary_instant() -> ParleyResult<()> {
    let f = test_service();
    let start = f.clock.now();
    seeded_conversation(&f, 3, 9, 6).await;

    let boundary = start + Duration::seconds(3);
    let page = f
        .service
        .list_messages_before(resolve(3, 9), boundary, 1, 20)
        .await?;

    assert_eq!(page.total, 3);
    assert!(page.data.iter().all(|m| m.created_at < boundary));
    assert!(page.data.iter().all(|m| m.id < id_from_time(boundary)));
    Ok(())
}

#[tokio::test]
async fn invalid_pagination_is_rejected() {
    let f = test_service();
    assert_invalid_pagination(&f.service.list_conversation_messages(resolve(1, 2), 0, 20).await);
    assert_invalid_pagination(&f.service.list_user_conversations(1, 1, -5).await);
    assert_eq!(f.store.stats().reads, 0);
}

#[tokio::test]
async fn degraded_fan_out_still_delivers_the_message() -> ParleyResult<()> {
    let f = test_service_with(no_retry_config());
    f.store.faults().fail_index_writes_for(1, 1);

    let outcome = f.service.send_message(1, 2, "hello".to_string()).await?;
    let pending = match &outcome.fan_out {
        FanOutStatus::Degraded { pending, .. } => pending.clone(),
        FanOutStatus::Complete => panic!("expected a degraded fan-out"),
    };

    let messages = f
        .service
        .list_conversation_messages(resolve(1, 2), 1, 20)
        .await?;
    assert_eq!(messages.total, 1);
    assert_eq!(f.service.list_user_conversations(1, 1, 20).await?.total, 0);
    assert_eq!(f.service.list_user_conversations(2, 1, 20).await?.total, 1);

    assert!(f.service.repair_fan_out(&pending).await?.is_complete());
    assert_eq!(f.service.list_user_conversations(1, 1, 20).await?.total, 1);
    Ok(())
}

#[tokio::test]
async fn unknown_conversation_is_absent() -> ParleyResult<()> {
    let f = test_service();
    assert!(f.service.get_conversation(resolve(40, 41)).await?.is_none());
    Ok(())
}

// ============================================================================
// PROPERTIES
// ============================================================================

fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => panic!("failed to build runtime: {e}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Whoever speaks last, both sides see one conversation carrying the
    /// latest text.
    #[test]
    fn prop_both_sides_see_latest_text(
        (a, b) in arb_user_pair(),
        texts in prop::collection::vec(arb_message_text(), 1..8),
    ) {
        let rt = runtime();
        let f = test_service();

        rt.block_on(async {
            for (i, text) in texts.iter().enumerate() {
                let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
                f.service.send_message(from, to, text.clone()).await?;
                f.clock.advance(Duration::milliseconds(10));
            }

            let last = texts.last().cloned().unwrap_or_default();
            for user in [a, b] {
                let page = f.service.list_user_conversations(user, 1, 20).await?;
                prop_assert_eq!(page.total, 1);
                prop_assert_eq!(&page.data[0].last_message_content, &last);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Repair only accepts ids present in the message log.
    #[test]
    fn prop_repair_rejects_unknown_message_ids(
        (a, b) in arb_user_pair(),
        message_id in arb_message_id(),
    ) {
        let rt = runtime();
        let f = test_service();

        rt.block_on(async {
            let sent = f.service.send_message(a, b, "hi".to_string()).await?;
            prop_assume!(message_id != sent.record.id);

            let pending = PendingFanOut {
                entries: vec![ConversationIndexEntry {
                    owner_id: a,
                    peer_id: b,
                    conversation_key: resolve(a, b),
                    last_message_id: message_id,
                    last_text: "hi".to_string(),
                }],
            };
            assert_invalid_index_entry(&f.service.repair_fan_out(&pending).await);

            let page = f.service.list_user_conversations(a, 1, 20).await?;
            prop_assert_eq!(page.total, 1);
            prop_assert_eq!(page.data[0].id, resolve(a, b));
            Ok::<(), TestCaseError>(())
        })?;
    }
}
