// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the wamux session orchestrator.

use thiserror::Error;

/// Classifies failures reported by a protocol client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ProtocolErrorKind {
    /// The underlying socket is already closed. Expected during teardown.
    ConnectionClosed,
    /// The client has not finished connecting.
    NotConnected,
    /// The network did not answer in time.
    Timeout,
    /// The network rejected the request (unknown group, not a participant, ...).
    Rejected,
    /// Anything else.
    Other,
}

/// The primary error type used across all wamux crates.
#[derive(Debug, Error)]
pub enum WamuxError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Errors surfaced by the protocol client.
    #[error("protocol error ({kind}): {message}")]
    Protocol {
        kind: ProtocolErrorKind,
        message: String,
    },

    /// The session is not registered (not connected, or already destroyed).
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// A live session with this identifier already exists.
    #[error("session already exists: {session_id}")]
    SessionExists { session_id: String },

    /// Pairing ended before a QR payload could be delivered to the caller.
    #[error("unable to create session {session_id}: {reason}")]
    PairingFailed { session_id: String, reason: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WamuxError {
    /// Shorthand for building a [`WamuxError::Protocol`].
    pub fn protocol(kind: ProtocolErrorKind, message: impl Into<String>) -> Self {
        Self::Protocol {
            kind,
            message: message.into(),
        }
    }

    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Storage { source: err.into() }
    }

    /// True when the error says the connection was already closed.
    pub fn is_connection_closed(&self) -> bool {
        matches!(
            self,
            Self::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
                ..
            }
        )
    }

    /// True for [`WamuxError::SessionNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound { .. })
    }
}

impl From<serde_json::Error> for WamuxError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage {
            source: Box::new(err),
        }
    }
}
