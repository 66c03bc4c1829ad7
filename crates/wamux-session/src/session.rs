// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One tenant connection: its state, budgets and exclusive protocol client.
//!
//! State and counters are only mutated by the session's own dispatcher task
//! (and by teardown). External callers read them and use the client through
//! [`Session::send_message`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wamux_bus::BusEvent;
use wamux_core::jid::normalize_jid;
use wamux_core::protocol::{MessageKey, OutgoingContent};
use wamux_core::{
    DeviceStatus, ProtocolClient, ProtocolErrorKind, SessionState, StatusLevel, WamuxError,
};

use crate::context::SessionContext;
use crate::qr::{QrEvent, QrOutcome, QrSink};
use crate::settings::SessionSettings;

pub(crate) struct SessionInner {
    pub state: SessionState,
    pub retry_count: u32,
    pub qr_generation_count: u32,
    pub client: Option<Arc<dyn ProtocolClient>>,
    pub own_jid: Option<String>,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub device_id: String,
    pub state: SessionState,
    /// Counted reconnects since the last successful open.
    pub retry_count: u32,
    /// Pairing payloads streamed so far.
    pub qr_generation_count: u32,
    /// Account jid, set once the connection opened.
    pub own_jid: Option<String>,
}

/// One live connection to the network, driven by its own dispatcher task.
///
/// Obtained from [`SessionManager`](crate::SessionManager); dropped from the
/// registry once torn down.
pub struct Session {
    session_id: String,
    device_id: String,
    settings: SessionSettings,
    pub(crate) ctx: Arc<SessionContext>,
    pub(crate) inner: Mutex<SessionInner>,
    qr: Mutex<QrSink>,
    cancel: CancellationToken,
    torn_down: AtomicBool,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub(crate) fn new(
        session_id: String,
        device_id: String,
        settings: SessionSettings,
        ctx: Arc<SessionContext>,
        sink: QrSink,
    ) -> Self {
        Self {
            session_id,
            device_id,
            settings,
            ctx,
            inner: Mutex::new(SessionInner {
                state: SessionState::Initializing,
                retry_count: 0,
                qr_generation_count: 0,
                client: None,
                own_jid: None,
            }),
            qr: Mutex::new(sink),
            cancel: CancellationToken::new(),
            torn_down: AtomicBool::new(false),
            dispatcher: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn retry_count(&self) -> u32 {
        self.inner.lock().await.retry_count
    }

    pub async fn qr_generation_count(&self) -> u32 {
        self.inner.lock().await.qr_generation_count
    }

    /// Account identifier reported when the connection opened.
    pub async fn own_jid(&self) -> Option<String> {
        self.inner.lock().await.own_jid.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        SessionSnapshot {
            session_id: self.session_id.clone(),
            device_id: self.device_id.clone(),
            state: inner.state,
            retry_count: inner.retry_count,
            qr_generation_count: inner.qr_generation_count,
            own_jid: inner.own_jid.clone(),
        }
    }

    /// True once teardown has started. A destroyed session is never reused.
    pub fn is_destroyed(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// The live protocol client, or `NotConnected`.
    pub async fn client(&self) -> Result<Arc<dyn ProtocolClient>, WamuxError> {
        self.inner.lock().await.client.clone().ok_or_else(|| {
            WamuxError::protocol(
                ProtocolErrorKind::NotConnected,
                format!("session {} has no live connection", self.session_id),
            )
        })
    }

    /// Sends through the protocol client and records the message at `pending`.
    pub async fn send_message(
        &self,
        jid: &str,
        content: OutgoingContent,
    ) -> Result<MessageKey, WamuxError> {
        if self.state().await != SessionState::Open {
            return Err(WamuxError::protocol(
                ProtocolErrorKind::NotConnected,
                format!("session {} is not open", self.session_id),
            ));
        }
        let client = self.client().await?;
        let jid = normalize_jid(jid);
        let key = client.send_message(&jid, content).await?;
        let remote_jid = normalize_jid(&key.remote_jid);
        self.ctx
            .reconciler
            .apply_status(&self.session_id, &remote_jid, &key.id, StatusLevel::Pending)
            .await?;
        Ok(key)
    }

    pub async fn send_text(&self, jid: &str, text: &str) -> Result<MessageKey, WamuxError> {
        self.send_message(jid, OutgoingContent::Text(text.to_string()))
            .await
    }

    /// `<sessions_dir>/<session_id>`, the session's scoped file storage.
    pub fn storage_dir(&self) -> PathBuf {
        self.ctx.sessions_dir.join(&self.session_id)
    }

    // --- crate-internal plumbing used by the lifecycle and teardown ---

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Admits exactly one teardown.
    pub(crate) fn begin_teardown(&self) -> bool {
        !self.torn_down.swap(true, Ordering::SeqCst)
    }

    /// Spawns the dispatcher. The handle is stored before any other task can
    /// observe the slot empty.
    pub(crate) async fn spawn_dispatcher<F>(&self, dispatcher: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.dispatcher.lock().await;
        *slot = Some(tokio::spawn(dispatcher));
    }

    pub(crate) async fn take_dispatcher(&self) -> Option<JoinHandle<()>> {
        self.dispatcher.lock().await.take()
    }

    /// Installs a fresh client, closing any previous one.
    pub(crate) async fn attach_client(&self, client: Arc<dyn ProtocolClient>) {
        let previous = self.inner.lock().await.client.replace(client);
        if let Some(previous) = previous {
            previous.close().await;
        }
    }

    pub(crate) async fn take_client(&self) -> Option<Arc<dyn ProtocolClient>> {
        self.inner.lock().await.client.take()
    }

    pub(crate) async fn take_sink(&self) -> QrSink {
        std::mem::replace(&mut *self.qr.lock().await, QrSink::None)
    }

    /// Sender of an attached QR stream, if any.
    pub(crate) async fn stream_sender(&self) -> Option<mpsc::Sender<QrEvent>> {
        match &*self.qr.lock().await {
            QrSink::Stream(tx) => Some(tx.clone()),
            _ => None,
        }
    }

    /// Delivers one QR code. Returns `false` when the stream's receiver is gone.
    pub(crate) async fn deliver_qr(&self, qr: String, data_url: String, generation: u32) -> bool {
        let stream_tx = {
            let mut sink = self.qr.lock().await;
            match std::mem::replace(&mut *sink, QrSink::None) {
                QrSink::Single(tx) => {
                    if tx.send(Ok(QrOutcome::Qr { qr, data_url })).is_err() {
                        debug!(session_id = %self.session_id, "single-response caller went away");
                    }
                    return true;
                }
                QrSink::Stream(tx) => {
                    *sink = QrSink::Stream(tx.clone());
                    tx
                }
                QrSink::None => return true,
            }
        };
        stream_tx
            .send(QrEvent::Qr {
                qr,
                data_url,
                generation,
            })
            .await
            .is_ok()
    }

    /// Fails a single-response caller still waiting for its first QR code.
    pub(crate) async fn fail_pending_reply(&self, reason: &str) {
        let mut sink = self.qr.lock().await;
        match std::mem::replace(&mut *sink, QrSink::None) {
            QrSink::Single(tx) => {
                let _ = tx.send(Err(WamuxError::PairingFailed {
                    session_id: self.session_id.clone(),
                    reason: reason.to_string(),
                }));
            }
            other => *sink = other,
        }
    }

    /// Persists and publishes the device status. Failures are logged.
    pub(crate) async fn set_device_status(&self, status: DeviceStatus, phone: Option<&str>) {
        if let Err(e) = self
            .ctx
            .storage
            .update_device_status(&self.device_id, status, phone)
            .await
        {
            warn!(
                session_id = %self.session_id,
                device_id = %self.device_id,
                error = %e,
                "failed to persist device status"
            );
        }
        self.ctx.bus.publish(BusEvent::DeviceStatus {
            device_id: self.device_id.clone(),
            status: status.to_string(),
            phone: phone.map(str::to_string),
        });
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("device_id", &self.device_id)
            .field("settings", &self.settings)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
