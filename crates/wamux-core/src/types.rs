// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the session layer, storage, and the notification bus.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of pluggable adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    /// Message, group, device and session persistence.
    Storage,
    /// Per-session authentication material.
    Credentials,
    /// The network client.
    Protocol,
    /// Inbound message collaborator.
    Hook,
}

/// Lifecycle state of one session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, first connection attempt in flight.
    Initializing,
    /// The network produced a pairing payload and waits for a scan.
    AwaitingPairing,
    /// Authenticated and connected.
    Open,
    /// Dropped for a recoverable reason; a new attempt is scheduled.
    Reconnecting,
    /// Torn down. Never resumed.
    Destroyed,
}

/// Delivery status of an outgoing message.
///
/// Ordered by [`StatusLevel::ordinal`]. `Error` shares the lowest rung with
/// `Pending`, so it never raises a stored status: a message whose only
/// report was `error` is persisted, and read back, as `pending`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    /// The network rejected the message.
    Error,
    /// Handed to the network, no acknowledgement yet.
    Pending,
    /// Accepted by the server.
    ServerAck,
    /// Delivered to the recipient's device.
    DeliveryAck,
    /// Opened by the recipient.
    Read,
    /// Voice or video message played.
    Played,
}

impl StatusLevel {
    /// Position on the status ladder used for compare-and-set.
    pub fn ordinal(self) -> i64 {
        match self {
            StatusLevel::Error | StatusLevel::Pending => 1,
            StatusLevel::ServerAck => 2,
            StatusLevel::DeliveryAck => 3,
            StatusLevel::Read => 4,
            StatusLevel::Played => 5,
        }
    }

    /// Inverse of [`ordinal`](Self::ordinal). Rung 1 is always `Pending`;
    /// `Error` is not recoverable from storage.
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            1 => Some(StatusLevel::Pending),
            2 => Some(StatusLevel::ServerAck),
            3 => Some(StatusLevel::DeliveryAck),
            4 => Some(StatusLevel::Read),
            5 => Some(StatusLevel::Played),
            _ => None,
        }
    }

    /// Maps the network's numeric status code (0 = error .. 5 = played).
    pub fn from_wire(code: i64) -> Option<Self> {
        match code {
            0 => Some(StatusLevel::Error),
            other => Self::from_ordinal(other),
        }
    }

    /// True if `self` sits strictly above `other` on the ladder.
    pub fn is_ahead_of(self, other: StatusLevel) -> bool {
        self.ordinal() > other.ordinal()
    }
}

/// Persisted connectivity of a device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// A connection attempt is in flight.
    Connecting,
    /// Waiting for a QR scan.
    Pairing,
    /// Authenticated session is open.
    Connected,
    /// No live session, or the session was destroyed.
    Disconnected,
}

/// Why the network closed a connection.
///
/// Numeric codes follow the multi-device web client conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// 428, closed by the server.
    ConnectionClosed,
    /// 408, timed out.
    ConnectionLost,
    /// 440, another client took over the account.
    ConnectionReplaced,
    /// 401, the device was unlinked. Terminal.
    LoggedOut,
    /// 500, corrupt session state.
    BadSession,
    /// 515, the server asks for an immediate reconnect after pairing.
    RestartRequired,
    /// 411
    MultideviceMismatch,
    /// 403
    Forbidden,
    /// 503
    Unavailable,
    /// The client could not be constructed or the socket never opened.
    ConnectionFailure,
    /// A code this layer does not know about.
    Other(u16),
}

impl DisconnectReason {
    /// Decodes a status code carried by a close notification.
    pub fn from_status_code(code: u16) -> Self {
        match code {
            428 => Self::ConnectionClosed,
            408 => Self::ConnectionLost,
            440 => Self::ConnectionReplaced,
            401 => Self::LoggedOut,
            500 => Self::BadSession,
            515 => Self::RestartRequired,
            411 => Self::MultideviceMismatch,
            403 => Self::Forbidden,
            503 => Self::Unavailable,
            other => Self::Other(other),
        }
    }

    /// Inverse of [`from_status_code`](Self::from_status_code).
    /// [`ConnectionFailure`](Self::ConnectionFailure) has no wire code and maps to 0.
    pub fn status_code(self) -> u16 {
        match self {
            Self::ConnectionClosed => 428,
            Self::ConnectionLost => 408,
            Self::ConnectionReplaced => 440,
            Self::LoggedOut => 401,
            Self::BadSession => 500,
            Self::RestartRequired => 515,
            Self::MultideviceMismatch => 411,
            Self::Forbidden => 403,
            Self::Unavailable => 503,
            Self::ConnectionFailure => 0,
            Self::Other(code) => code,
        }
    }

    /// Explicit logout: the credentials are gone, never retry.
    pub fn is_logout(self) -> bool {
        matches!(self, Self::LoggedOut)
    }

    /// The network asks for a fresh socket right away (sent after a scan).
    pub fn requires_immediate_restart(self) -> bool {
        matches!(self, Self::RestartRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_ladder_order() {
        assert_eq!(StatusLevel::Error.ordinal(), StatusLevel::Pending.ordinal());
        assert!(StatusLevel::ServerAck.is_ahead_of(StatusLevel::Pending));
        assert!(StatusLevel::Read.is_ahead_of(StatusLevel::DeliveryAck));
        assert!(StatusLevel::Played.is_ahead_of(StatusLevel::Read));
        assert!(!StatusLevel::Error.is_ahead_of(StatusLevel::Pending));
        assert!(!StatusLevel::DeliveryAck.is_ahead_of(StatusLevel::Read));
    }

    #[test]
    fn status_from_wire_codes() {
        assert_eq!(StatusLevel::from_wire(0), Some(StatusLevel::Error));
        assert_eq!(StatusLevel::from_wire(1), Some(StatusLevel::Pending));
        assert_eq!(StatusLevel::from_wire(4), Some(StatusLevel::Read));
        assert_eq!(StatusLevel::from_wire(9), None);
        assert_eq!(StatusLevel::from_ordinal(0), None);
    }

    #[test]
    fn stored_rungs_read_back_except_error() {
        for level in [
            StatusLevel::Pending,
            StatusLevel::ServerAck,
            StatusLevel::DeliveryAck,
            StatusLevel::Read,
            StatusLevel::Played,
        ] {
            assert_eq!(StatusLevel::from_ordinal(level.ordinal()), Some(level));
        }
        assert_eq!(
            StatusLevel::from_ordinal(StatusLevel::Error.ordinal()),
            Some(StatusLevel::Pending)
        );
    }

    #[test]
    fn status_level_strings() {
        assert_eq!(StatusLevel::DeliveryAck.to_string(), "delivery_ack");
        assert_eq!(
            StatusLevel::from_str("server_ack").unwrap(),
            StatusLevel::ServerAck
        );
    }

    #[test]
    fn session_state_display() {
        assert_eq!(SessionState::Initializing.to_string(), "initializing");
        assert_eq!(SessionState::AwaitingPairing.to_string(), "awaiting_pairing");
        assert_eq!(SessionState::Open.to_string(), "open");
        assert_eq!(SessionState::Reconnecting.to_string(), "reconnecting");
        assert_eq!(SessionState::Destroyed.to_string(), "destroyed");
    }

    #[test]
    fn disconnect_reason_codes() {
        assert_eq!(
            DisconnectReason::from_status_code(401),
            DisconnectReason::LoggedOut
        );
        assert!(DisconnectReason::from_status_code(401).is_logout());
        assert!(DisconnectReason::from_status_code(515).requires_immediate_restart());
        assert_eq!(
            DisconnectReason::from_status_code(499),
            DisconnectReason::Other(499)
        );
        assert_eq!(DisconnectReason::ConnectionReplaced.status_code(), 440);
    }

    #[test]
    fn device_status_roundtrip() {
        for status in [
            DeviceStatus::Connecting,
            DeviceStatus::Pairing,
            DeviceStatus::Connected,
            DeviceStatus::Disconnected,
        ] {
            let parsed = DeviceStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
    }
}
