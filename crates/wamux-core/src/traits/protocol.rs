// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol client contract.
//!
//! The multi-device protocol itself lives outside this workspace. A
//! [`ProtocolConnector`] opens one connection attempt and hands back the
//! client together with the receiving end of its event channel.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::WamuxError;
use crate::protocol::{Credentials, GroupMetadata, MessageKey, OutgoingContent, ProtocolEvent};

/// Imperative operations on one live connection.
#[async_trait]
pub trait ProtocolClient: Send + Sync + 'static {
    /// Sends a message and returns the key the client assigned to it.
    async fn send_message(
        &self,
        jid: &str,
        content: OutgoingContent,
    ) -> Result<MessageKey, WamuxError>;

    async fn group_metadata(&self, group_id: &str) -> Result<GroupMetadata, WamuxError>;

    /// Every group the account currently participates in.
    async fn group_fetch_all_participating(&self) -> Result<Vec<GroupMetadata>, WamuxError>;

    /// Unlinks the device. Fails with `ConnectionClosed` when the socket is gone.
    async fn logout(&self) -> Result<(), WamuxError>;

    /// Closes the socket without unlinking. Never fails.
    async fn close(&self);
}

/// A connection attempt: the client plus its ordered event stream.
pub struct Connection {
    pub client: Arc<dyn ProtocolClient>,
    pub events: mpsc::Receiver<ProtocolEvent>,
}

/// Factory for protocol clients, one call per connection attempt.
#[async_trait]
pub trait ProtocolConnector: Send + Sync + 'static {
    async fn connect(
        &self,
        session_id: &str,
        credentials: Option<Credentials>,
    ) -> Result<Connection, WamuxError>;
}
