// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Business-rule collaborators triggered by inbound messages.

use async_trait::async_trait;

use crate::error::WamuxError;

/// What a collaborator gets to see about an inbound direct message.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundContext {
    /// Session that received the message.
    pub session_id: String,
    /// Device of that session.
    pub device_id: String,
    /// Normalized sender JID.
    pub remote_jid: String,
    pub message_id: String,
    /// Sender's display name.
    pub push_name: Option<String>,
    /// Text body, `None` for media without a caption.
    pub text: Option<String>,
    /// Seconds since the epoch.
    pub timestamp: Option<i64>,
}

/// Auto-reply, business-hours and campaign-reply rules implement this.
///
/// Hooks run detached from the event loop; an error or panic is logged and
/// never affects message persistence or the other hooks.
#[async_trait]
pub trait InboundHook: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn on_inbound(&self, ctx: InboundContext) -> Result<(), WamuxError>;
}
