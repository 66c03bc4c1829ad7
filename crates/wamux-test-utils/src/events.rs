// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shorthand constructors for protocol events used in tests.

use wamux_core::protocol::{
    ConnectionUpdate, Credentials, GroupMetadata, GroupParticipant, MessageKey, MessageUpdate,
    ParticipantAction, ParticipantsUpdate, ProtocolEvent, Reaction, ReactionUpdate, Receipt,
    ReceiptUpdate, UpsertKind, WaMessage,
};
use wamux_core::{DisconnectReason, StatusLevel};

pub fn connecting() -> ProtocolEvent {
    ProtocolEvent::ConnectionUpdate(ConnectionUpdate::Connecting)
}

pub fn qr(payload: &str) -> ProtocolEvent {
    ProtocolEvent::ConnectionUpdate(ConnectionUpdate::Qr(payload.to_string()))
}

pub fn open(jid: &str) -> ProtocolEvent {
    ProtocolEvent::ConnectionUpdate(ConnectionUpdate::Open {
        jid: jid.to_string(),
    })
}

pub fn close(reason: DisconnectReason) -> ProtocolEvent {
    ProtocolEvent::ConnectionUpdate(ConnectionUpdate::Close { reason })
}

pub fn creds(value: serde_json::Value) -> ProtocolEvent {
    ProtocolEvent::CredsUpdate(Credentials(value))
}

/// A text message as the network delivers it.
pub fn text_message(remote_jid: &str, id: &str, from_me: bool, text: &str) -> WaMessage {
    WaMessage {
        key: MessageKey::new(remote_jid, id, from_me),
        push_name: (!from_me).then(|| "Tester".to_string()),
        message_type: Some("conversation".to_string()),
        text: Some(text.to_string()),
        timestamp: Some(1_700_000_000),
        status: None,
        payload: serde_json::json!({ "conversation": text }),
    }
}

/// A live (`notify`) upsert of one message.
pub fn upsert(message: WaMessage) -> ProtocolEvent {
    ProtocolEvent::MessagesUpsert {
        messages: vec![message],
        kind: UpsertKind::Notify,
    }
}

/// A history-sync (`append`) upsert.
pub fn append(messages: Vec<WaMessage>) -> ProtocolEvent {
    ProtocolEvent::MessagesUpsert {
        messages,
        kind: UpsertKind::Append,
    }
}

pub fn status_update(remote_jid: &str, id: &str, status: StatusLevel) -> ProtocolEvent {
    ProtocolEvent::MessagesUpdate(vec![MessageUpdate {
        key: MessageKey::new(remote_jid, id, true),
        status: Some(status),
    }])
}

pub fn receipt(remote_jid: &str, id: &str, user_jid: &str, read_at: Option<i64>) -> ProtocolEvent {
    ProtocolEvent::MessageReceiptUpdate(vec![ReceiptUpdate {
        key: MessageKey::new(remote_jid, id, true),
        receipt: Receipt {
            user_jid: user_jid.to_string(),
            receipt_timestamp: Some(1_700_000_001),
            read_timestamp: read_at,
            played_timestamp: None,
        },
    }])
}

pub fn reaction(remote_jid: &str, id: &str, author: &str, text: &str) -> ProtocolEvent {
    ProtocolEvent::MessagesReaction(vec![ReactionUpdate {
        key: MessageKey::new(remote_jid, id, false),
        reaction: Reaction {
            author: author.to_string(),
            text: text.to_string(),
            timestamp: None,
        },
    }])
}

/// Group metadata with `members` numbered participants.
pub fn group(id: &str, subject: &str, members: usize) -> GroupMetadata {
    GroupMetadata {
        id: id.to_string(),
        subject: subject.to_string(),
        owner: None,
        participants: (0..members)
            .map(|n| GroupParticipant {
                id: format!("62800000{n}@s.whatsapp.net"),
                admin: None,
            })
            .collect(),
    }
}

pub fn participants(group_id: &str, action: ParticipantAction, jids: &[&str]) -> ProtocolEvent {
    ProtocolEvent::GroupParticipantsUpdate(ParticipantsUpdate {
        id: group_id.to_string(),
        participants: jids.iter().map(|j| j.to_string()).collect(),
        action,
    })
}
