// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted record types and the merge rules shared by every store.

use serde::{Deserialize, Serialize};

use crate::protocol::{GroupMetadata, Reaction, Receipt};
use crate::types::{DeviceStatus, StatusLevel};

/// Per-session overrides persisted with the configuration row.
///
/// `None` fields fall back to the service-wide `[session]` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Overrides `session.max_retries`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Overrides `session.reconnect_interval_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_interval_ms: Option<u64>,
    /// Overrides `session.max_qr_generations`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_qr_generations: Option<u32>,
}

/// One row per session, read back on process restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfigRow {
    /// Primary key.
    pub session_id: String,
    /// Device the session authenticates as.
    pub device_id: String,
    /// JSON encoding of [`SessionOptions`].
    pub options: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl SessionConfigRow {
    /// Row stamped with the current time.
    pub fn new(
        session_id: &str,
        device_id: &str,
        options: &SessionOptions,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            session_id: session_id.to_string(),
            device_id: device_id.to_string(),
            options: serde_json::to_string(options)?,
            created_at: now_rfc3339(),
        })
    }

    /// Decodes [`options`](Self::options). An empty column means defaults.
    pub fn parse_options(&self) -> Result<SessionOptions, serde_json::Error> {
        if self.options.trim().is_empty() {
            return Ok(SessionOptions::default());
        }
        serde_json::from_str(&self.options)
    }
}

/// A persisted message keyed by `(session_id, remote_jid, message_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    /// `None` once the owning session has been destroyed.
    pub session_id: Option<String>,
    /// Normalized chat jid.
    pub remote_jid: String,
    pub message_id: String,
    pub from_me: bool,
    /// Author inside a group chat.
    pub participant: Option<String>,
    pub push_name: Option<String>,
    pub message_type: Option<String>,
    /// Extracted text, if any.
    pub body: Option<String>,
    /// Raw protocol payload as JSON text.
    pub payload: String,
    /// Seconds since the epoch.
    pub timestamp: Option<i64>,
    /// One entry per recipient, see [`merge_receipt`].
    pub user_receipts: Vec<Receipt>,
    /// One entry per author, see [`merge_reaction`].
    pub reactions: Vec<Reaction>,
    /// Soft-deleted by the network. The row is kept.
    pub deleted: bool,
}

/// Result of a status compare-and-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    /// The stored level moved up. `previous` is `None` for a fresh row.
    Advanced {
        previous: Option<StatusLevel>,
        current: StatusLevel,
    },
    /// The observed level was not above the stored one.
    Discarded { current: StatusLevel },
}

impl StatusOutcome {
    /// True if the stored level changed.
    pub fn is_advanced(&self) -> bool {
        matches!(self, StatusOutcome::Advanced { .. })
    }

    /// Stored level after the operation.
    pub fn current(&self) -> StatusLevel {
        match *self {
            StatusOutcome::Advanced { current, .. } | StatusOutcome::Discarded { current } => {
                current
            }
        }
    }
}

/// Cached group membership for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub group_id: String,
    /// Owning device. Groups are keyed by `(device_id, group_id)`.
    pub device_id: String,
    pub group_name: String,
    pub participants_count: i64,
    /// `false` once the account left the group. Rows are never deleted.
    pub is_active: bool,
}

impl GroupRecord {
    /// Builds an active row from fetched metadata.
    pub fn from_metadata(device_id: &str, meta: &GroupMetadata) -> Self {
        Self {
            group_id: meta.id.clone(),
            device_id: device_id.to_string(),
            group_name: meta.subject.clone(),
            participants_count: meta.participants.len() as i64,
            is_active: true,
        }
    }
}

/// Persisted connectivity of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device_id: String,
    pub status: DeviceStatus,
    /// Phone number taken from the account jid on open.
    pub phone: Option<String>,
    /// RFC 3339 time of the last status write.
    pub updated_at: String,
}

/// Replaces any receipt from the same counterpart, otherwise appends.
pub fn merge_receipt(receipts: &mut Vec<Receipt>, incoming: Receipt) {
    match receipts
        .iter_mut()
        .find(|r| r.user_jid == incoming.user_jid)
    {
        Some(existing) => *existing = incoming,
        None => receipts.push(incoming),
    }
}

/// Replaces the author's previous reaction; empty text removes it.
pub fn merge_reaction(reactions: &mut Vec<Reaction>, incoming: Reaction) {
    reactions.retain(|r| r.author != incoming.author);
    if !incoming.text.is_empty() {
        reactions.push(incoming);
    }
}

/// Timestamp format used by every persisted row.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(user: &str, read: Option<i64>) -> Receipt {
        Receipt {
            user_jid: user.to_string(),
            receipt_timestamp: Some(1),
            read_timestamp: read,
            played_timestamp: None,
        }
    }

    #[test]
    fn receipts_replace_same_user() {
        let mut receipts = vec![receipt("a@s.whatsapp.net", None)];
        merge_receipt(&mut receipts, receipt("b@s.whatsapp.net", None));
        merge_receipt(&mut receipts, receipt("a@s.whatsapp.net", Some(10)));
        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].read_timestamp, Some(10));
    }

    #[test]
    fn reactions_replace_and_remove() {
        let mut reactions = Vec::new();
        merge_reaction(
            &mut reactions,
            Reaction {
                author: "a".into(),
                text: "👍".into(),
                timestamp: None,
            },
        );
        merge_reaction(
            &mut reactions,
            Reaction {
                author: "a".into(),
                text: "❤️".into(),
                timestamp: None,
            },
        );
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].text, "❤️");

        merge_reaction(
            &mut reactions,
            Reaction {
                author: "a".into(),
                text: String::new(),
                timestamp: None,
            },
        );
        assert!(reactions.is_empty());
    }

    #[test]
    fn session_options_roundtrip_through_row() {
        let options = SessionOptions {
            max_retries: Some(3),
            ..Default::default()
        };
        let row = SessionConfigRow::new("s1", "d1", &options).unwrap();
        assert_eq!(row.parse_options().unwrap(), options);

        let empty = SessionConfigRow {
            options: String::new(),
            ..row
        };
        assert_eq!(empty.parse_options().unwrap(), SessionOptions::default());
    }

    #[test]
    fn group_record_counts_participants() {
        let meta = GroupMetadata {
            id: "g1@g.us".into(),
            subject: "Team".into(),
            owner: None,
            participants: vec![
                crate::protocol::GroupParticipant {
                    id: "a".into(),
                    admin: None,
                },
                crate::protocol::GroupParticipant {
                    id: "b".into(),
                    admin: Some("admin".into()),
                },
            ],
        };
        let record = GroupRecord::from_metadata("d1", &meta);
        assert_eq!(record.participants_count, 2);
        assert!(record.is_active);
    }
}
