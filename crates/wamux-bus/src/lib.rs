// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed notification bus.
//!
//! Sessions publish device status, message and group notifications here;
//! any number of subscribers (websocket fan-out, webhooks, tests) read them
//! through a [`tokio::sync::broadcast`] channel. Publishing never blocks and
//! never fails: with no subscriber the event is simply dropped, and a slow
//! subscriber observes `RecvError::Lagged` instead of stalling a session.

mod events;

pub use events::{BusEnvelope, BusEvent, MessageNotice};

use tokio::sync::broadcast;
use tracing::trace;

/// Subscriber end. Slow subscribers see `Lagged` and skip ahead.
pub type BusReceiver = broadcast::Receiver<BusEnvelope>;

/// Cloneable handle to the process-wide broadcast channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<BusEnvelope>,
}

impl EventBus {
    /// Creates a bus buffering `capacity` events per subscriber.
    ///
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receives every event published from now on.
    pub fn subscribe(&self) -> BusReceiver {
        self.tx.subscribe()
    }

    /// Best-effort publish. Returns the number of subscribers reached.
    pub fn publish(&self, event: BusEvent) -> usize {
        let envelope = BusEnvelope::new(event);
        let topic = envelope.topic();
        match self.tx.send(envelope) {
            Ok(n) => {
                trace!(topic = %topic, subscribers = n, "bus event published");
                n
            }
            Err(_) => {
                trace!(topic = %topic, "bus event dropped, no subscribers");
                0
            }
        }
    }

    /// Live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
