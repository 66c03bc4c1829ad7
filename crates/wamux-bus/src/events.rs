// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event payloads carried on the bus.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// What happened to a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageNotice {
    /// A message was persisted (inbound, self-sent or history).
    New {
        remote_jid: String,
        message_id: String,
        from_me: bool,
        push_name: Option<String>,
        body: Option<String>,
        timestamp: Option<i64>,
    },
    /// An outgoing message's delivery status moved forward.
    StatusChanged {
        remote_jid: String,
        message_id: String,
        status: String,
    },
}

/// Notifications published by sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    DeviceStatus {
        device_id: String,
        status: String,
        phone: Option<String>,
    },
    Message {
        session_id: String,
        #[serde(flatten)]
        notice: MessageNotice,
    },
    GroupJoined {
        device_id: String,
        group_id: String,
        group_name: String,
    },
    GroupLeft {
        device_id: String,
        group_id: String,
    },
    /// A full group resync finished.
    GroupsUpdated {
        device_id: String,
        active_count: usize,
    },
}

impl BusEvent {
    /// Subscription topic, e.g. `device:<id>:status` or `message:<sessionId>`.
    pub fn topic(&self) -> String {
        match self {
            BusEvent::DeviceStatus { device_id, .. } => format!("device:{device_id}:status"),
            BusEvent::Message { session_id, .. } => format!("message:{session_id}"),
            BusEvent::GroupJoined { device_id, .. } => format!("device:{device_id}:group-joined"),
            BusEvent::GroupLeft { device_id, .. } => format!("device:{device_id}:group-left"),
            BusEvent::GroupsUpdated { device_id, .. } => {
                format!("device:{device_id}:groups-updated")
            }
        }
    }
}

/// An event plus delivery metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusEnvelope {
    /// Unique per publish.
    pub id: Uuid,
    /// Time the event was handed to the bus.
    pub published_at: DateTime<Utc>,
    pub event: BusEvent,
}

impl BusEnvelope {
    /// Wraps `event` with a fresh id and the current time.
    pub fn new(event: BusEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            published_at: Utc::now(),
            event,
        }
    }

    /// Topic of the wrapped event.
    pub fn topic(&self) -> String {
        self.event.topic()
    }

    /// JSON body for external fan-out.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
