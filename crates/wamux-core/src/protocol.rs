// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed events and payloads exchanged with the protocol client.
//!
//! A protocol client emits one [`ProtocolEvent`] stream per connection. The
//! session dispatcher consumes it in order, so variants only carry data and
//! no callbacks.

use serde::{Deserialize, Serialize};

use crate::types::{DisconnectReason, StatusLevel};

/// Opaque authentication material, rotated by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(pub serde_json::Value);

/// Connection lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionUpdate {
    /// The socket is being opened.
    Connecting,
    /// A fresh pairing payload to show as a QR code.
    Qr(String),
    /// Authenticated. `jid` is the account's own identifier.
    Open { jid: String },
    /// The socket closed.
    Close { reason: DisconnectReason },
}

/// Address of one message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageKey {
    /// Chat the message belongs to.
    pub remote_jid: String,
    /// Message id, unique per chat.
    pub id: String,
    /// Sent by this account.
    pub from_me: bool,
    /// Author inside a group chat.
    pub participant: Option<String>,
}

impl MessageKey {
    /// Key without a group participant.
    pub fn new(remote_jid: impl Into<String>, id: impl Into<String>, from_me: bool) -> Self {
        Self {
            remote_jid: remote_jid.into(),
            id: id.into(),
            from_me,
            participant: None,
        }
    }
}

/// A message as delivered by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct WaMessage {
    pub key: MessageKey,
    /// Sender's display name, as set on their device.
    pub push_name: Option<String>,
    /// Content kind (`conversation`, `imageMessage`, ...).
    pub message_type: Option<String>,
    /// Plain text extracted from the content, when there is any.
    pub text: Option<String>,
    /// Seconds since the epoch.
    pub timestamp: Option<i64>,
    /// Delivery status reported alongside our own messages.
    pub status: Option<StatusLevel>,
    /// Full protocol payload, persisted as-is.
    pub payload: serde_json::Value,
}

/// Whether an upsert batch is live traffic or history sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    /// Arrived while connected. Inbound hooks run for these.
    Notify,
    /// Backfilled history.
    Append,
}

/// Change to a message already sent or received.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageUpdate {
    pub key: MessageKey,
    /// New delivery status, if the update carries one.
    pub status: Option<StatusLevel>,
}

/// Messages removed by the network.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageDeletion {
    /// Individual messages.
    Keys(Vec<MessageKey>),
    /// Every message of one chat.
    Chat { remote_jid: String },
}

/// Per-recipient delivery receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Recipient the receipt is for. Merged per user.
    pub user_jid: String,
    /// Delivered at, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_timestamp: Option<i64>,
    /// Read at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timestamp: Option<i64>,
    /// Played at, for voice and video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub played_timestamp: Option<i64>,
}

/// A receipt for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptUpdate {
    pub key: MessageKey,
    pub receipt: Receipt,
}

/// An emoji reaction. Empty `text` means the author withdrew it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// Who reacted. At most one reaction per author is kept.
    pub author: String,
    /// The emoji.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// A reaction on one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionUpdate {
    pub key: MessageKey,
    pub reaction: Reaction,
}

/// One member of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupParticipant {
    pub id: String,
    /// `admin` or `superadmin`; `None` for regular members.
    pub admin: Option<String>,
}

/// Group metadata as returned by a metadata query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMetadata {
    /// Group jid, ending in `@g.us`.
    pub id: String,
    /// Group name.
    pub subject: String,
    /// Creator, when the server reports one.
    pub owner: Option<String>,
    pub participants: Vec<GroupParticipant>,
}

/// Partial change to a group's settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupUpdate {
    pub id: String,
    /// New name, if it changed.
    pub subject: Option<String>,
}

/// What happened to the participants of a [`ParticipantsUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ParticipantAction {
    Add,
    Remove,
    Promote,
    Demote,
}

/// Membership change in one group.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantsUpdate {
    /// Group jid.
    pub id: String,
    /// Affected members.
    pub participants: Vec<String>,
    pub action: ParticipantAction,
}

/// Change to a chat's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatUpdate {
    /// Chat jid. Group chats trigger a group refresh.
    pub id: String,
    pub unread_count: Option<i64>,
}

/// Content handed to [`ProtocolClient::send_message`](crate::ProtocolClient::send_message).
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingContent {
    /// Plain text message.
    Text(String),
    /// Pre-built protocol message.
    Raw(serde_json::Value),
}

/// Every event a protocol client can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// Connection lifecycle. Drives the session state machine.
    ConnectionUpdate(ConnectionUpdate),
    /// Rotated credentials. Must be persisted before the next event.
    CredsUpdate(Credentials),
    /// New or backfilled messages.
    MessagesUpsert {
        messages: Vec<WaMessage>,
        kind: UpsertKind,
    },
    /// Status changes to known messages.
    MessagesUpdate(Vec<MessageUpdate>),
    /// Deleted messages or cleared chats.
    MessagesDelete(MessageDeletion),
    /// Per-recipient receipts.
    MessageReceiptUpdate(Vec<ReceiptUpdate>),
    /// Reactions added or withdrawn.
    MessagesReaction(Vec<ReactionUpdate>),
    /// Groups the account joined.
    GroupsUpsert(Vec<GroupMetadata>),
    /// Group setting changes.
    GroupsUpdate(Vec<GroupUpdate>),
    /// Membership changes in one group.
    GroupParticipantsUpdate(ParticipantsUpdate),
    /// Chat metadata changes.
    ChatsUpdate(Vec<ChatUpdate>),
}

impl ProtocolEvent {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolEvent::ConnectionUpdate(_) => "connection.update",
            ProtocolEvent::CredsUpdate(_) => "creds.update",
            ProtocolEvent::MessagesUpsert { .. } => "messages.upsert",
            ProtocolEvent::MessagesUpdate(_) => "messages.update",
            ProtocolEvent::MessagesDelete(_) => "messages.delete",
            ProtocolEvent::MessageReceiptUpdate(_) => "message-receipt.update",
            ProtocolEvent::MessagesReaction(_) => "messages.reaction",
            ProtocolEvent::GroupsUpsert(_) => "groups.upsert",
            ProtocolEvent::GroupsUpdate(_) => "groups.update",
            ProtocolEvent::GroupParticipantsUpdate(_) => "group-participants.update",
            ProtocolEvent::ChatsUpdate(_) => "chats.update",
        }
    }
}
