// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent, best-effort release of a session's resources.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use wamux_core::{DeviceStatus, SessionState, WamuxError};

use crate::qr::{QrEvent, QrSink};
use crate::session::Session;

/// Upper bound on waiting for a cancelled dispatcher before aborting it.
const DISPATCHER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Destroys `session` from inside its own dispatcher task.
///
/// Only the first call does anything; it returns `true`. Sub-steps run
/// concurrently and each failure is logged without stopping the others.
/// The session is deregistered last, so its id cannot be reused while its
/// rows and credentials are still being removed.
pub(crate) async fn destroy(session: &Arc<Session>, logout: bool) -> bool {
    release(session, logout, false).await
}

/// Destroys `session` from any other task.
///
/// The dispatcher is stopped before anything is released, so no event
/// handler can write to the session after teardown started.
pub(crate) async fn destroy_and_join(session: &Arc<Session>, logout: bool) -> bool {
    release(session, logout, true).await
}

async fn release(session: &Arc<Session>, logout: bool, join_dispatcher: bool) -> bool {
    let session_id = session.session_id();
    if !session.begin_teardown() {
        debug!(session_id, "teardown already ran");
        return false;
    }

    {
        let mut inner = session.inner.lock().await;
        inner.state = SessionState::Destroyed;
        inner.qr_generation_count = 0;
    }
    session.cancel_token().cancel();

    if join_dispatcher && let Some(mut handle) = session.take_dispatcher().await {
        if tokio::time::timeout(DISPATCHER_STOP_TIMEOUT, &mut handle)
            .await
            .is_err()
        {
            warn!(session_id, "dispatcher did not stop in time, aborting it");
            handle.abort();
            let _ = handle.await;
        }
    }

    match session.take_sink().await {
        QrSink::Single(tx) => {
            let _ = tx.send(Err(WamuxError::PairingFailed {
                session_id: session_id.to_string(),
                reason: "session destroyed".to_string(),
            }));
        }
        QrSink::Stream(tx) => {
            let _ = tx.try_send(QrEvent::Error {
                reason: "session destroyed".to_string(),
            });
        }
        QrSink::None => {}
    }

    let ctx = &session.ctx;
    let client = session.take_client().await;

    let release_client = async {
        let Some(client) = client else {
            return;
        };
        if logout {
            match client.logout().await {
                Ok(()) => debug!(session_id, "logged out"),
                Err(e) if e.is_connection_closed() => {
                    debug!(session_id, "logout skipped, connection already closed")
                }
                Err(e) => warn!(session_id, error = %e, "logout failed"),
            }
        }
        client.close().await;
    };
    let detach = async {
        match ctx.storage.detach_messages(session_id).await {
            Ok(n) => debug!(session_id, messages = n, "messages detached"),
            Err(e) => warn!(session_id, error = %e, "failed to detach messages"),
        }
    };
    let config = async {
        if let Err(e) = ctx.storage.delete_session_config(session_id).await {
            warn!(session_id, error = %e, "failed to delete session config");
        }
    };
    let credentials = async {
        if let Err(e) = ctx.credentials.delete(session_id).await {
            warn!(session_id, error = %e, "failed to delete credentials");
        }
    };
    let files = async {
        if let Err(e) = remove_session_dir(&ctx.sessions_dir, session_id).await {
            warn!(session_id, error = %e, "failed to remove session directory");
        }
    };
    tokio::join!(release_client, detach, config, credentials, files);

    session
        .set_device_status(DeviceStatus::Disconnected, None)
        .await;
    ctx.registry.deregister(session_id, session).await;
    info!(session_id, logout, "session destroyed");
    true
}

/// Removes `<root>/<session_id>`. A missing directory is not an error.
pub(crate) async fn remove_session_dir(root: &Path, session_id: &str) -> io::Result<()> {
    if session_id.is_empty()
        || session_id == "."
        || session_id == ".."
        || session_id.contains(['/', '\\'])
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to remove directory for session id {session_id:?}"),
        ));
    }
    match tokio::fs::remove_dir_all(root.join(session_id)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removes_scoped_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("s1");
        std::fs::create_dir_all(dir.join("keys")).unwrap();
        std::fs::write(dir.join("keys/a.json"), b"{}").unwrap();

        remove_session_dir(root.path(), "s1").await.unwrap();
        assert!(!dir.exists());
        // Second removal finds nothing and still succeeds.
        remove_session_dir(root.path(), "s1").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_ids_escaping_the_root() {
        let root = tempfile::tempdir().unwrap();
        for id in ["", "..", "../etc", "a/b"] {
            assert!(remove_session_dir(root.path(), id).await.is_err(), "{id}");
        }
    }
}
