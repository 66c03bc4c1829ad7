// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Monotonic delivery status for outgoing messages.
//!
//! Acknowledgements from the network arrive out of order and repeated. The
//! stored status only ever moves up the ladder
//! `pending = error < server_ack < delivery_ack < read < played`; anything
//! else is discarded.

use std::sync::Arc;

use tracing::debug;
use wamux_bus::{BusEvent, EventBus, MessageNotice};
use wamux_core::{StatusLevel, StatusOutcome, StorageAdapter, WamuxError};

/// Applies outgoing status observations and publishes accepted changes.
#[derive(Clone)]
pub struct StatusReconciler {
    storage: Arc<dyn StorageAdapter>,
    bus: EventBus,
}

impl StatusReconciler {
    pub fn new(storage: Arc<dyn StorageAdapter>, bus: EventBus) -> Self {
        Self { storage, bus }
    }

    /// Compare-and-set `observed` onto the message's stored status.
    ///
    /// An accepted change is published on `message:<session_id>`.
    pub async fn apply_status(
        &self,
        session_id: &str,
        remote_jid: &str,
        message_id: &str,
        observed: StatusLevel,
    ) -> Result<StatusOutcome, WamuxError> {
        let outcome = self
            .storage
            .advance_status(session_id, remote_jid, message_id, observed)
            .await?;

        match outcome {
            StatusOutcome::Advanced { previous, current } => {
                debug!(
                    session_id,
                    message_id,
                    from = ?previous,
                    to = %current,
                    "message status advanced"
                );
                self.bus.publish(BusEvent::Message {
                    session_id: session_id.to_string(),
                    notice: MessageNotice::StatusChanged {
                        remote_jid: remote_jid.to_string(),
                        message_id: message_id.to_string(),
                        status: current.to_string(),
                    },
                });
            }
            StatusOutcome::Discarded { current } => {
                debug!(
                    session_id,
                    message_id,
                    observed = %observed,
                    current = %current,
                    "stale status update discarded"
                );
            }
        }
        Ok(outcome)
    }
}
