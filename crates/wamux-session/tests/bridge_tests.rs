// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event bridging: message persistence, status reconciliation, groups, hooks.

use std::sync::Arc;
use std::time::Duration;

use wamux_bus::{BusEvent, BusReceiver, MessageNotice};
use wamux_core::protocol::{MessageDeletion, MessageKey, ParticipantAction, ProtocolEvent};
use wamux_core::{ProtocolErrorKind, SessionState, StatusLevel, StorageAdapter, WamuxError};
use wamux_session::DeliveryMode;
use wamux_test_utils::mock_hook::HookBehavior;
use wamux_test_utils::{events, RecordingHook, TestHarness};

const OWN_JID: &str = "6281234:7@s.whatsapp.net";
const PEER: &str = "6285550001@s.whatsapp.net";

async fn open_session(harness: &TestHarness) {
    harness.connector.script(vec![events::open(OWN_JID)]).await;
    harness
        .manager
        .create_session("s1", "d1", DeliveryMode::None)
        .await
        .unwrap();
    assert!(harness.wait_for_state("s1", SessionState::Open).await);
}

/// Waits for the `New` notice of `message_id`, which also proves every
/// event emitted before it was handled.
async fn wait_new(rx: &mut BusReceiver, message_id: &str) -> MessageNotice {
    loop {
        let envelope = TestHarness::next_on_topic(rx, "message:s1")
            .await
            .expect("message notice");
        if let BusEvent::Message { notice, .. } = envelope.event
            && let MessageNotice::New { message_id: id, .. } = &notice
            && id == message_id
        {
            return notice;
        }
    }
}

/// Emits an inbound marker message and waits until it was handled.
async fn barrier(harness: &TestHarness, rx: &mut BusReceiver, marker: &str) {
    assert!(
        harness
            .connector
            .emit(events::append(vec![events::text_message(PEER, marker, false, "marker")]))
            .await
    );
    wait_new(rx, marker).await;
}

#[tokio::test]
async fn inbound_message_is_normalized_persisted_and_hooked() {
    let hook = Arc::new(RecordingHook::new("auto-reply"));
    let harness = TestHarness::builder().hook(hook.clone()).build().await.unwrap();
    open_session(&harness).await;
    let mut rx = harness.subscribe();

    harness
        .connector
        .emit(events::upsert(events::text_message(
            "6285550001:3@S.WhatsApp.Net",
            "m1",
            false,
            "hello",
        )))
        .await;

    match wait_new(&mut rx, "m1").await {
        MessageNotice::New {
            remote_jid, body, ..
        } => {
            assert_eq!(remote_jid, PEER);
            assert_eq!(body.as_deref(), Some("hello"));
        }
        other => panic!("unexpected {other:?}"),
    }
    let stored = harness
        .storage
        .get_message("s1", PEER, "m1")
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.from_me);

    assert!(hook.wait_for_calls(1, Duration::from_secs(5)).await);
    let call = &hook.calls().await[0];
    assert_eq!(call.remote_jid, PEER);
    assert_eq!(call.device_id, "d1");
    assert_eq!(call.text.as_deref(), Some("hello"));
}

#[tokio::test]
async fn broadcast_group_and_history_messages_skip_hooks() {
    let hook = Arc::new(RecordingHook::new("auto-reply"));
    let harness = TestHarness::builder().hook(hook.clone()).build().await.unwrap();
    open_session(&harness).await;
    let mut rx = harness.subscribe();
    let memory = harness.memory.clone().unwrap();

    for event in [
        events::upsert(events::text_message("status@broadcast", "b1", false, "story")),
        events::upsert(events::text_message("1203630@newsletter", "b2", false, "news")),
        events::upsert(events::text_message("1203630001@g.us", "g1", false, "in group")),
        events::append(vec![events::text_message(PEER, "h1", false, "history")]),
        events::upsert(events::text_message(PEER, "d1", false, "direct")),
    ] {
        harness.connector.emit(event).await;
    }
    wait_new(&mut rx, "d1").await;

    // Broadcast chats are never stored; group and history messages are.
    assert_eq!(memory.message_count().await, 3);
    assert!(hook.wait_for_calls(1, Duration::from_secs(5)).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let calls = hook.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].message_id, "d1");
}

#[tokio::test]
async fn outgoing_status_only_moves_forward() {
    let harness = TestHarness::builder().with_sqlite().build().await.unwrap();
    open_session(&harness).await;
    let mut rx = harness.subscribe();

    harness
        .connector
        .emit(events::upsert(events::text_message(PEER, "m1", true, "ping")))
        .await;
    for status in [
        StatusLevel::ServerAck,
        StatusLevel::Read,
        StatusLevel::DeliveryAck,
        StatusLevel::ServerAck,
    ] {
        harness
            .connector
            .emit(events::status_update(PEER, "m1", status))
            .await;
    }
    barrier(&harness, &mut rx, "marker-1").await;

    assert_eq!(
        harness.storage.get_status("m1").await.unwrap(),
        Some(StatusLevel::Read)
    );
}

#[tokio::test]
async fn accepted_status_changes_are_published() {
    let harness = TestHarness::builder().build().await.unwrap();
    open_session(&harness).await;
    let mut rx = harness.subscribe();

    harness
        .connector
        .emit(events::upsert(events::text_message(PEER, "m1", true, "ping")))
        .await;
    for status in [StatusLevel::DeliveryAck, StatusLevel::ServerAck, StatusLevel::Read] {
        harness
            .connector
            .emit(events::status_update(PEER, "m1", status))
            .await;
    }
    harness
        .connector
        .emit(events::append(vec![events::text_message(PEER, "marker", false, "marker")]))
        .await;

    let mut statuses = Vec::new();
    loop {
        let envelope = TestHarness::next_on_topic(&mut rx, "message:s1")
            .await
            .expect("message notice");
        match envelope.event {
            BusEvent::Message {
                notice: MessageNotice::StatusChanged { status, .. },
                ..
            } => statuses.push(status),
            BusEvent::Message {
                notice: MessageNotice::New { message_id, .. },
                ..
            } if message_id == "marker" => break,
            _ => {}
        }
    }
    // The stale server_ack is discarded without a notice.
    assert_eq!(statuses, ["pending", "delivery_ack", "read"]);
}

#[tokio::test]
async fn receipts_reactions_and_deletes_merge_into_the_record() {
    let harness = TestHarness::builder().with_sqlite().build().await.unwrap();
    open_session(&harness).await;
    let mut rx = harness.subscribe();
    let member = "6285550002@s.whatsapp.net";

    harness
        .connector
        .emit(events::upsert(events::text_message(PEER, "m1", true, "hi all")))
        .await;
    harness
        .connector
        .emit(events::receipt(PEER, "m1", member, None))
        .await;
    harness
        .connector
        .emit(events::receipt(PEER, "m1", "6285550002:4@s.whatsapp.net", Some(99)))
        .await;
    harness
        .connector
        .emit(events::reaction(PEER, "m1", member, "👍"))
        .await;
    harness
        .connector
        .emit(events::reaction(PEER, "m1", PEER, "🎉"))
        .await;
    harness
        .connector
        .emit(events::reaction(PEER, "m1", PEER, ""))
        .await;
    barrier(&harness, &mut rx, "marker-1").await;

    let stored = harness
        .storage
        .get_message("s1", PEER, "m1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.user_receipts.len(), 1);
    assert_eq!(stored.user_receipts[0].read_timestamp, Some(99));
    assert_eq!(stored.reactions.len(), 1);
    assert_eq!(stored.reactions[0].author, member);
    assert!(!stored.deleted);

    harness
        .connector
        .emit(ProtocolEvent::MessagesDelete(MessageDeletion::Keys(vec![
            MessageKey::new(PEER, "m1", true),
            MessageKey::new(PEER, "unknown", true),
        ])))
        .await;
    harness
        .connector
        .emit(ProtocolEvent::MessagesDelete(MessageDeletion::Chat {
            remote_jid: "6285550001@c.us".to_string(),
        }))
        .await;
    barrier(&harness, &mut rx, "marker-2").await;

    let stored = harness
        .storage
        .get_message("s1", PEER, "m1")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.deleted);
}

#[tokio::test]
async fn open_triggers_full_group_resync() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .client
        .add_group(events::group("1203630001@g.us", "Team", 3))
        .await;
    harness
        .client
        .add_group(events::group("1203630002@g.us", "Family", 5))
        .await;
    let mut rx = harness.subscribe();
    open_session(&harness).await;

    let envelope = TestHarness::next_on_topic(&mut rx, "device:d1:groups-updated")
        .await
        .expect("resync notice");
    assert_eq!(
        envelope.event,
        BusEvent::GroupsUpdated {
            device_id: "d1".into(),
            active_count: 2
        }
    );
    let groups = harness.storage.list_groups("d1", true).await.unwrap();
    assert_eq!(groups.len(), 2);
}

#[tokio::test]
async fn joined_group_falls_back_to_event_snapshot() {
    let harness = TestHarness::builder().build().await.unwrap();
    let mut rx = harness.subscribe();
    open_session(&harness).await;
    TestHarness::next_on_topic(&mut rx, "device:d1:groups-updated")
        .await
        .expect("resync notice");

    harness
        .connector
        .emit(ProtocolEvent::GroupsUpsert(vec![events::group(
            "1203630003@g.us",
            "Launch",
            4,
        )]))
        .await;
    let envelope = TestHarness::next_on_topic(&mut rx, "device:d1:group-joined")
        .await
        .expect("join notice");
    assert_eq!(
        envelope.event,
        BusEvent::GroupJoined {
            device_id: "d1".into(),
            group_id: "1203630003@g.us".into(),
            group_name: "Launch".into(),
        }
    );
    let groups = harness.storage.list_groups("d1", true).await.unwrap();
    assert_eq!(groups[0].participants_count, 4);
}

#[tokio::test]
async fn self_removal_deactivates_group() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .client
        .add_group(events::group("1203630001@g.us", "Team", 3))
        .await;
    let mut rx = harness.subscribe();
    open_session(&harness).await;
    TestHarness::next_on_topic(&mut rx, "device:d1:groups-updated")
        .await
        .expect("resync notice");

    // Removing someone else only refreshes the row.
    harness
        .connector
        .emit(events::participants(
            "1203630001@g.us",
            ParticipantAction::Remove,
            &["6289999999@s.whatsapp.net"],
        ))
        .await;
    harness
        .connector
        .emit(events::participants(
            "1203630001@g.us",
            ParticipantAction::Remove,
            &["6281234@s.whatsapp.net"],
        ))
        .await;

    let envelope = TestHarness::next_on_topic(&mut rx, "device:d1:group-left")
        .await
        .expect("left notice");
    assert_eq!(
        envelope.event,
        BusEvent::GroupLeft {
            device_id: "d1".into(),
            group_id: "1203630001@g.us".into(),
        }
    );
    assert!(harness.storage.list_groups("d1", true).await.unwrap().is_empty());
    assert_eq!(harness.storage.list_groups("d1", false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn participant_updates_neither_insert_nor_reactivate_groups() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .client
        .add_group(events::group("1203630001@g.us", "Team", 3))
        .await;
    let mut rx = harness.subscribe();
    open_session(&harness).await;
    TestHarness::next_on_topic(&mut rx, "device:d1:groups-updated")
        .await
        .expect("resync notice");
    assert!(
        harness
            .storage
            .set_group_active("d1", "1203630001@g.us", false)
            .await
            .unwrap()
    );
    // Known to the server, never cached locally.
    harness
        .client
        .add_group(events::group("1203630002@g.us", "Other", 5))
        .await;

    for group_id in ["1203630001@g.us", "1203630002@g.us"] {
        harness
            .connector
            .emit(events::participants(
                group_id,
                ParticipantAction::Add,
                &["6289999999@s.whatsapp.net"],
            ))
            .await;
    }
    barrier(&harness, &mut rx, "after-updates").await;

    let all = harness.storage.list_groups("d1", false).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].group_id, "1203630001@g.us");
    assert!(!all[0].is_active);
    assert!(harness.storage.list_groups("d1", true).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_refresh_is_treated_as_leaving() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .client
        .add_group(events::group("1203630001@g.us", "Team", 3))
        .await;
    let mut rx = harness.subscribe();
    open_session(&harness).await;
    TestHarness::next_on_topic(&mut rx, "device:d1:groups-updated")
        .await
        .expect("resync notice");

    harness.client.fail_group("1203630001@g.us").await;
    harness
        .connector
        .emit(ProtocolEvent::ChatsUpdate(vec![
            wamux_core::protocol::ChatUpdate {
                id: PEER.to_string(),
                unread_count: Some(1),
            },
            wamux_core::protocol::ChatUpdate {
                id: "1203630001@g.us".to_string(),
                unread_count: Some(2),
            },
        ]))
        .await;

    assert!(
        TestHarness::next_on_topic(&mut rx, "device:d1:group-left")
            .await
            .is_some()
    );
    assert!(harness.storage.list_groups("d1", true).await.unwrap().is_empty());
}

#[tokio::test]
async fn failing_hooks_do_not_affect_persistence_or_each_other() {
    let failing = Arc::new(RecordingHook::with_behavior("business-hours", HookBehavior::Fail));
    let panicking = Arc::new(RecordingHook::with_behavior("campaign-reply", HookBehavior::Panic));
    let healthy = Arc::new(RecordingHook::new("auto-reply"));
    let harness = TestHarness::builder()
        .hook(failing.clone())
        .hook(panicking.clone())
        .hook(healthy.clone())
        .build()
        .await
        .unwrap();
    open_session(&harness).await;
    let mut rx = harness.subscribe();

    for id in ["m1", "m2"] {
        harness
            .connector
            .emit(events::upsert(events::text_message(PEER, id, false, "hi")))
            .await;
    }
    wait_new(&mut rx, "m2").await;

    assert!(healthy.wait_for_calls(2, Duration::from_secs(5)).await);
    assert!(failing.wait_for_calls(2, Duration::from_secs(5)).await);
    assert!(panicking.wait_for_calls(2, Duration::from_secs(5)).await);
    assert!(
        harness
            .storage
            .get_message("s1", PEER, "m2")
            .await
            .unwrap()
            .is_some()
    );
    assert_eq!(
        harness.manager.session_status("s1").await.unwrap(),
        SessionState::Open
    );
}

#[tokio::test]
async fn storage_failures_do_not_stop_the_dispatcher() {
    let harness = TestHarness::builder().build().await.unwrap();
    open_session(&harness).await;
    let memory = harness.memory.clone().unwrap();
    let mut rx = harness.subscribe();

    memory.set_failing(true);
    harness
        .connector
        .emit(events::upsert(events::text_message(PEER, "lost", false, "hi")))
        .await;
    harness
        .connector
        .emit(events::status_update(PEER, "m0", StatusLevel::Read))
        .await;
    // Wait for the dispatcher to get past both events.
    tokio::time::sleep(Duration::from_millis(50)).await;
    memory.set_failing(false);

    barrier(&harness, &mut rx, "marker-1").await;
    assert!(
        harness
            .storage
            .get_message("s1", PEER, "lost")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn send_text_records_pending_status() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.connector.script(vec![events::qr("ref-1")]).await;
    harness
        .manager
        .create_session("s1", "d1", DeliveryMode::None)
        .await
        .unwrap();
    assert!(harness.wait_for_state("s1", SessionState::AwaitingPairing).await);

    let session = harness.manager.get_session("s1").await.unwrap();
    let err = session.send_text(PEER, "too early").await.unwrap_err();
    assert!(matches!(
        err,
        WamuxError::Protocol {
            kind: ProtocolErrorKind::NotConnected,
            ..
        }
    ));

    harness.connector.emit(events::open(OWN_JID)).await;
    assert!(harness.wait_for_state("s1", SessionState::Open).await);
    let key = session.send_text("+6285550001", "hello").await.unwrap();
    assert_eq!(key.remote_jid, PEER);
    assert_eq!(
        harness.storage.get_status(&key.id).await.unwrap(),
        Some(StatusLevel::Pending)
    );
    assert_eq!(harness.client.sent_messages().await.len(), 1);
}
