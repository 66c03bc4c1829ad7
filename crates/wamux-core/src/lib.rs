// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the wamux session orchestrator.
//!
//! This crate holds the error type, the protocol event model, persisted
//! record types and the trait seams (storage, credentials, protocol client,
//! inbound hooks) that the session layer is written against.

pub mod error;
pub mod jid;
pub mod protocol;
pub mod records;
pub mod traits;
pub mod types;

pub use error::{ProtocolErrorKind, WamuxError};
pub use records::{
    DeviceRecord, GroupRecord, SessionConfigRow, SessionOptions, StatusOutcome, StoredMessage,
};
pub use types::{
    AdapterType, DeviceStatus, DisconnectReason, HealthStatus, SessionState, StatusLevel,
};

pub use traits::{
    Connection, CredentialStore, InboundContext, InboundHook, PluginAdapter, ProtocolClient,
    ProtocolConnector, StorageAdapter,
};
