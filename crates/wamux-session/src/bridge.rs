// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalizes protocol events, persists them and republishes notifications.
//!
//! Every handler is awaited by the dispatcher before the next event is
//! taken. Persistence failures are logged per event and never stop the loop.

use std::sync::Arc;

use tracing::{debug, trace, warn};
use wamux_bus::{BusEvent, MessageNotice};
use wamux_core::jid::{is_broadcast_jid, is_group_jid, normalize_jid, same_user};
use wamux_core::protocol::{
    ChatUpdate, GroupMetadata, GroupUpdate, MessageDeletion, MessageUpdate, ParticipantAction,
    ParticipantsUpdate, ProtocolEvent, ReactionUpdate, ReceiptUpdate, UpsertKind, WaMessage,
};
use wamux_core::{GroupRecord, InboundContext, StatusLevel, StoredMessage, WamuxError};

use crate::session::Session;

/// Applies one non-connection event to storage and the bus.
pub(crate) async fn handle_event(session: &Arc<Session>, event: ProtocolEvent) {
    trace!(event = event.kind(), "handling protocol event");
    match event {
        ProtocolEvent::MessagesUpsert { messages, kind } => {
            for message in messages {
                upsert_message(session, message, kind).await;
            }
        }
        ProtocolEvent::MessagesUpdate(updates) => {
            for update in updates {
                update_status(session, update).await;
            }
        }
        ProtocolEvent::MessagesDelete(deletion) => delete_messages(session, deletion).await,
        ProtocolEvent::MessageReceiptUpdate(receipts) => {
            for receipt in receipts {
                merge_receipt(session, receipt).await;
            }
        }
        ProtocolEvent::MessagesReaction(reactions) => {
            for reaction in reactions {
                merge_reaction(session, reaction).await;
            }
        }
        ProtocolEvent::GroupsUpsert(groups) => {
            for group in groups {
                group_joined(session, group).await;
            }
        }
        ProtocolEvent::GroupsUpdate(updates) => {
            for GroupUpdate { id, .. } in updates {
                refresh_group(session, &id).await;
            }
        }
        ProtocolEvent::GroupParticipantsUpdate(update) => participants_changed(session, update).await,
        ProtocolEvent::ChatsUpdate(chats) => {
            for ChatUpdate { id, .. } in chats {
                if is_group_jid(&id) {
                    refresh_group(session, &id).await;
                }
            }
        }
        // Connection and credential events never reach the bridge.
        ProtocolEvent::ConnectionUpdate(_) | ProtocolEvent::CredsUpdate(_) => {}
    }
}

async fn upsert_message(session: &Arc<Session>, message: WaMessage, kind: UpsertKind) {
    if is_broadcast_jid(&message.key.remote_jid) {
        trace!(remote_jid = %message.key.remote_jid, "skipping broadcast message");
        return;
    }
    let ctx = &session.ctx;
    let session_id = session.session_id();
    let remote_jid = normalize_jid(&message.key.remote_jid);
    let from_me = message.key.from_me;

    let record = StoredMessage {
        session_id: Some(session_id.to_string()),
        remote_jid: remote_jid.clone(),
        message_id: message.key.id.clone(),
        from_me,
        participant: message.key.participant.as_deref().map(normalize_jid),
        push_name: message.push_name.clone(),
        message_type: message.message_type.clone(),
        body: message.text.clone(),
        payload: message.payload.to_string(),
        timestamp: message.timestamp,
        user_receipts: Vec::new(),
        reactions: Vec::new(),
        deleted: false,
    };
    if let Err(e) = ctx.storage.upsert_message(&record).await {
        warn!(message_id = %record.message_id, error = %e, "failed to persist message");
        return;
    }

    ctx.bus.publish(BusEvent::Message {
        session_id: session_id.to_string(),
        notice: MessageNotice::New {
            remote_jid: remote_jid.clone(),
            message_id: record.message_id.clone(),
            from_me,
            push_name: record.push_name.clone(),
            body: record.body.clone(),
            timestamp: record.timestamp,
        },
    });

    if from_me {
        let observed = message.status.unwrap_or(StatusLevel::Pending);
        if let Err(e) = ctx
            .reconciler
            .apply_status(session_id, &remote_jid, &record.message_id, observed)
            .await
        {
            warn!(message_id = %record.message_id, error = %e, "failed to record outgoing status");
        }
        return;
    }

    if kind == UpsertKind::Notify && !is_group_jid(&remote_jid) {
        let inbound = InboundContext {
            session_id: session_id.to_string(),
            device_id: session.device_id().to_string(),
            remote_jid,
            message_id: record.message_id,
            push_name: record.push_name,
            text: record.body,
            timestamp: record.timestamp,
        };
        for hook in &ctx.hooks {
            let hook = Arc::clone(hook);
            let inbound = inbound.clone();
            ctx.supervisor.dispatch(hook.name().to_string(), async move {
                hook.on_inbound(inbound).await
            });
        }
    }
}

async fn update_status(session: &Arc<Session>, update: MessageUpdate) {
    let Some(observed) = update.status else {
        return;
    };
    if !update.key.from_me {
        trace!(message_id = %update.key.id, "ignoring status of inbound message");
        return;
    }
    let remote_jid = normalize_jid(&update.key.remote_jid);
    if let Err(e) = session
        .ctx
        .reconciler
        .apply_status(session.session_id(), &remote_jid, &update.key.id, observed)
        .await
    {
        warn!(message_id = %update.key.id, error = %e, "failed to apply status update");
    }
}

async fn delete_messages(session: &Arc<Session>, deletion: MessageDeletion) {
    let storage = &session.ctx.storage;
    let session_id = session.session_id();
    let result = match deletion {
        MessageDeletion::Keys(keys) => {
            let keys: Vec<(String, String)> = keys
                .into_iter()
                .map(|k| (normalize_jid(&k.remote_jid), k.id))
                .collect();
            storage.mark_messages_deleted(session_id, &keys).await
        }
        MessageDeletion::Chat { remote_jid } => {
            storage
                .mark_chat_deleted(session_id, &normalize_jid(&remote_jid))
                .await
        }
    };
    match result {
        Ok(count) => debug!(count, "messages marked deleted"),
        Err(e) => warn!(error = %e, "failed to mark messages deleted"),
    }
}

async fn merge_receipt(session: &Arc<Session>, update: ReceiptUpdate) {
    let remote_jid = normalize_jid(&update.key.remote_jid);
    let mut receipt = update.receipt;
    receipt.user_jid = normalize_jid(&receipt.user_jid);
    match session
        .ctx
        .storage
        .merge_receipt(session.session_id(), &remote_jid, &update.key.id, &receipt)
        .await
    {
        Ok(true) => {}
        Ok(false) => debug!(message_id = %update.key.id, "receipt for unknown message"),
        Err(e) => warn!(message_id = %update.key.id, error = %e, "failed to merge receipt"),
    }
}

async fn merge_reaction(session: &Arc<Session>, update: ReactionUpdate) {
    let remote_jid = normalize_jid(&update.key.remote_jid);
    let mut reaction = update.reaction;
    reaction.author = normalize_jid(&reaction.author);
    match session
        .ctx
        .storage
        .merge_reaction(session.session_id(), &remote_jid, &update.key.id, &reaction)
        .await
    {
        Ok(true) => {}
        Ok(false) => debug!(message_id = %update.key.id, "reaction to unknown message"),
        Err(e) => warn!(message_id = %update.key.id, error = %e, "failed to merge reaction"),
    }
}

async fn group_joined(session: &Arc<Session>, snapshot: GroupMetadata) {
    let meta = match fetch_metadata(session, &snapshot.id).await {
        Ok(meta) => meta,
        Err(e) => {
            debug!(group_id = %snapshot.id, error = %e, "metadata fetch failed, using event snapshot");
            snapshot
        }
    };
    let record = GroupRecord::from_metadata(session.device_id(), &meta);
    if let Err(e) = session.ctx.storage.upsert_group(&record).await {
        warn!(group_id = %record.group_id, error = %e, "failed to persist joined group");
        return;
    }
    session.ctx.bus.publish(BusEvent::GroupJoined {
        device_id: session.device_id().to_string(),
        group_id: record.group_id,
        group_name: record.group_name,
    });
}

async fn participants_changed(session: &Arc<Session>, update: ParticipantsUpdate) {
    if update.action == ParticipantAction::Remove {
        let own_jid = session.own_jid().await;
        let removed_self = own_jid
            .as_deref()
            .is_some_and(|own| update.participants.iter().any(|p| same_user(p, own)));
        if removed_self {
            mark_left(session, &update.id).await;
            return;
        }
    }
    refresh_group(session, &update.id).await;
}

/// Re-reads one group. A failed fetch means the account is no longer in it.
async fn refresh_group(session: &Arc<Session>, group_id: &str) {
    match fetch_metadata(session, group_id).await {
        Ok(meta) => {
            let refreshed = session
                .ctx
                .storage
                .refresh_group(
                    session.device_id(),
                    group_id,
                    &meta.subject,
                    meta.participants.len() as i64,
                )
                .await;
            match refreshed {
                Ok(true) => {}
                Ok(false) => debug!(group_id, "update for a group that is not cached"),
                Err(e) => warn!(group_id, error = %e, "failed to refresh group"),
            }
        }
        Err(e) => {
            debug!(group_id, error = %e, "metadata fetch failed, treating as left");
            mark_left(session, group_id).await;
        }
    }
}

async fn mark_left(session: &Arc<Session>, group_id: &str) {
    match session
        .ctx
        .storage
        .set_group_active(session.device_id(), group_id, false)
        .await
    {
        Ok(true) => {
            session.ctx.bus.publish(BusEvent::GroupLeft {
                device_id: session.device_id().to_string(),
                group_id: group_id.to_string(),
            });
        }
        Ok(false) => debug!(group_id, "left a group that was never cached"),
        Err(e) => warn!(group_id, error = %e, "failed to deactivate group"),
    }
}

async fn fetch_metadata(session: &Arc<Session>, group_id: &str) -> Result<GroupMetadata, WamuxError> {
    session.client().await?.group_metadata(group_id).await
}

/// Full group resync: replaces the device's cache with the participating
/// groups and returns the active count.
pub(crate) async fn resync_groups(session: &Arc<Session>) -> Result<usize, WamuxError> {
    let client = session.client().await?;
    let groups = client.group_fetch_all_participating().await?;
    let records: Vec<GroupRecord> = groups
        .iter()
        .map(|meta| GroupRecord::from_metadata(session.device_id(), meta))
        .collect();
    session
        .ctx
        .storage
        .replace_groups(session.device_id(), &records)
        .await?;
    let active_count = records.len();
    debug!(active_count, "groups resynced");
    session.ctx.bus.publish(BusEvent::GroupsUpdated {
        device_id: session.device_id().to_string(),
        active_count,
    });
    Ok(active_count)
}
