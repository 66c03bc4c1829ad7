// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spawn-and-isolate runner for fire-and-forget work.
//!
//! Inbound hooks and background group resyncs run here. Their failures and
//! panics are logged with the task name and never reach the dispatcher that
//! scheduled them.

use std::future::Future;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing::{debug, warn, Instrument};
use wamux_core::WamuxError;

/// Owns detached side tasks so shutdown can wait for them.
#[derive(Clone, Default)]
pub struct Supervisor {
    tracker: TaskTracker,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `task` detached. A watcher awaits it and logs an error or panic.
    pub fn dispatch<F>(&self, name: impl Into<String>, task: F)
    where
        F: Future<Output = Result<(), WamuxError>> + Send + 'static,
    {
        let name = name.into();
        let handle = self.tracker.spawn(task.in_current_span());
        let watcher = async move {
            match handle.await {
                Ok(Ok(())) => debug!(task = %name, "supervised task finished"),
                Ok(Err(e)) => warn!(task = %name, error = %e, "supervised task failed"),
                Err(join_err) if join_err.is_panic() => {
                    warn!(task = %name, "supervised task panicked")
                }
                Err(join_err) => debug!(task = %name, error = %join_err, "supervised task cancelled"),
            }
        };
        self.tracker.spawn(watcher.in_current_span());
    }

    /// Number of tasks (including watchers) still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits up to `timeout` for in-flight tasks. Returns `true` if everything
    /// finished.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        if drained {
            debug!("supervised tasks drained");
        } else {
            warn!(remaining = self.tracker.len(), "supervised tasks still running after drain timeout");
        }
        self.tracker.reopen();
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn failure_is_logged_not_propagated() {
        let supervisor = Supervisor::new();
        supervisor.dispatch("auto-reply", async {
            Err(WamuxError::Internal("boom".into()))
        });
        assert!(supervisor.drain(Duration::from_secs(1)).await);
        assert!(logs_contain("supervised task failed"));
        assert!(logs_contain("auto-reply"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn panic_is_isolated() {
        let supervisor = Supervisor::new();
        let ran = Arc::new(AtomicUsize::new(0));

        supervisor.dispatch("panicky", async { panic!("hook exploded") });
        let counter = Arc::clone(&ran);
        supervisor.dispatch("steady", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(supervisor.drain(Duration::from_secs(1)).await);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(logs_contain("supervised task panicked"));
    }

    #[tokio::test]
    async fn drain_times_out_on_stuck_task() {
        let supervisor = Supervisor::new();
        supervisor.dispatch("stuck", async {
            std::future::pending::<()>().await;
            Ok(())
        });
        assert!(!supervisor.drain(Duration::from_millis(20)).await);
        assert!(supervisor.in_flight() > 0);
    }
}
