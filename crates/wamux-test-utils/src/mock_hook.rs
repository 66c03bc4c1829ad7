// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound hook double.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use wamux_core::{InboundContext, InboundHook, WamuxError};

/// What a [`RecordingHook`] does after recording the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookBehavior {
    Succeed,
    Fail,
    Panic,
}

/// Records every inbound context it is handed.
pub struct RecordingHook {
    name: String,
    behavior: HookBehavior,
    calls: Mutex<Vec<InboundContext>>,
}

impl RecordingHook {
    pub fn new(name: &str) -> Self {
        Self::with_behavior(name, HookBehavior::Succeed)
    }

    pub fn with_behavior(name: &str, behavior: HookBehavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> Vec<InboundContext> {
        self.calls.lock().await.clone()
    }

    /// Waits until at least `count` calls were recorded. `false` on timeout.
    pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        let wait = async {
            while self.calls.lock().await.len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

#[async_trait]
impl InboundHook for RecordingHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_inbound(&self, ctx: InboundContext) -> Result<(), WamuxError> {
        self.calls.lock().await.push(ctx);
        match self.behavior {
            HookBehavior::Succeed => Ok(()),
            HookBehavior::Fail => Err(WamuxError::Internal(format!("{} refused", self.name))),
            HookBehavior::Panic => panic!("{} blew up", self.name),
        }
    }
}
