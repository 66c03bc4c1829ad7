// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Public entry point: create, look up, delete, restore and shut down sessions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, info_span, warn, Instrument};
use wamux_bus::EventBus;
use wamux_config::model::SessionConfig;
use wamux_core::{
    CredentialStore, InboundHook, ProtocolConnector, SessionConfigRow, SessionOptions,
    SessionState, StorageAdapter, WamuxError,
};

use crate::context::SessionContext;
use crate::qr::{self, DeliveryMode, PendingReply, QrEvent, QrOutcome, QrSink, QrStream};
use crate::reconciler::StatusReconciler;
use crate::registry::SessionRegistry;
use crate::session::{Session, SessionSnapshot};
use crate::settings::SessionSettings;
use crate::supervisor::Supervisor;
use crate::{lifecycle, teardown};

/// What `create_session` hands back, depending on the delivery mode.
#[derive(Debug)]
pub enum CreateOutcome {
    /// [`DeliveryMode::Single`]: the first QR code, or `AlreadyConnected`.
    Qr(QrOutcome),
    /// [`DeliveryMode::Stream`]: every QR code until a terminal event.
    Stream(QrStream),
    /// [`DeliveryMode::None`]: the session runs with no attached caller.
    Started,
}

/// Owns the registry and the collaborators shared by all sessions.
///
/// Cheap to clone; clones share the same sessions.
#[derive(Clone)]
pub struct SessionManager {
    ctx: Arc<SessionContext>,
}

impl SessionManager {
    /// Starts building a manager over the three required adapters.
    pub fn builder(
        storage: Arc<dyn StorageAdapter>,
        credentials: Arc<dyn CredentialStore>,
        connector: Arc<dyn ProtocolConnector>,
    ) -> SessionManagerBuilder {
        SessionManagerBuilder {
            storage,
            credentials,
            connector,
            bus: None,
            hooks: Vec::new(),
            session_config: SessionConfig::default(),
        }
    }

    /// Notification bus the sessions publish on.
    pub fn bus(&self) -> &EventBus {
        &self.ctx.bus
    }

    /// Tracker of detached hook tasks.
    pub fn supervisor(&self) -> &Supervisor {
        &self.ctx.supervisor
    }

    /// Root of the per-session scoped storage.
    pub fn sessions_dir(&self) -> &std::path::Path {
        &self.ctx.sessions_dir
    }

    /// Starts a session with the service-wide budgets.
    pub async fn create_session(
        &self,
        session_id: &str,
        device_id: &str,
        mode: DeliveryMode,
    ) -> Result<CreateOutcome, WamuxError> {
        self.create_session_with(session_id, device_id, SessionOptions::default(), mode)
            .await
    }

    /// Reserves the id, persists the configuration row and starts the
    /// session's dispatcher.
    ///
    /// The id is registered before the row is written, so a concurrent create
    /// of the same id fails with `SessionExists` without touching storage. If
    /// the row cannot be written the reservation is released.
    ///
    /// In [`DeliveryMode::Single`] this waits for the first QR code (or the
    /// open connection) and fails with `PairingFailed` if the connection
    /// closes first.
    pub async fn create_session_with(
        &self,
        session_id: &str,
        device_id: &str,
        options: SessionOptions,
        mode: DeliveryMode,
    ) -> Result<CreateOutcome, WamuxError> {
        if session_id.trim().is_empty() {
            return Err(WamuxError::Config("session id must not be empty".to_string()));
        }
        let row = SessionConfigRow::new(session_id, device_id, &options)?;

        let (session, pending) = self.reserve(session_id, device_id, &options, mode).await?;
        if let Err(e) = self.ctx.storage.save_session_config(&row).await {
            self.ctx.registry.deregister(session_id, &session).await;
            return Err(e);
        }
        self.launch(&session, mode).await;

        match pending {
            PendingReply::Single(rx) => match rx.await {
                Ok(Ok(outcome)) => Ok(CreateOutcome::Qr(outcome)),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(WamuxError::PairingFailed {
                    session_id: session_id.to_string(),
                    reason: "session ended before a QR code was produced".to_string(),
                }),
            },
            PendingReply::Stream(stream) => Ok(CreateOutcome::Stream(stream)),
            PendingReply::None => Ok(CreateOutcome::Started),
        }
    }

    /// Builds the session and registers it under its id.
    async fn reserve(
        &self,
        session_id: &str,
        device_id: &str,
        options: &SessionOptions,
        mode: DeliveryMode,
    ) -> Result<(Arc<Session>, PendingReply), WamuxError> {
        let settings = SessionSettings::resolve(&self.ctx.defaults, options);
        let (sink, pending) = qr::channel(mode, session_id, settings.qr_buffer);
        let session = Arc::new(Session::new(
            session_id.to_string(),
            device_id.to_string(),
            settings,
            Arc::clone(&self.ctx),
            sink,
        ));
        self.ctx
            .registry
            .register(session_id, Arc::clone(&session))
            .await?;
        Ok((session, pending))
    }

    async fn launch(&self, session: &Arc<Session>, mode: DeliveryMode) {
        let session_id = session.session_id();
        let device_id = session.device_id();
        let span = info_span!("session", session_id, device_id);
        session
            .spawn_dispatcher(lifecycle::run(Arc::clone(session)).instrument(span))
            .await;
        info!(session_id, device_id, ?mode, "session started");
    }

    /// Live session by id, or `SessionNotFound`.
    pub async fn get_session(&self, session_id: &str) -> Result<Arc<Session>, WamuxError> {
        self.ctx.registry.lookup(session_id).await
    }

    /// Logs the device out and removes everything the session owns.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), WamuxError> {
        let session = self.ctx.registry.lookup(session_id).await?;
        teardown::destroy_and_join(&session, true).await;
        Ok(())
    }

    /// Current state of a live session. Unknown and destroyed ids are
    /// `SessionNotFound`.
    pub async fn session_status(&self, session_id: &str) -> Result<SessionState, WamuxError> {
        let session = self.ctx.registry.lookup(session_id).await?;
        match session.state().await {
            SessionState::Destroyed => Err(WamuxError::SessionNotFound {
                session_id: session_id.to_string(),
            }),
            state => Ok(state),
        }
    }

    /// Snapshots of every live session, ordered by id.
    pub async fn list_sessions(&self) -> Vec<SessionSnapshot> {
        let mut snapshots = Vec::new();
        for session in self.ctx.registry.snapshot().await {
            let snapshot = session.snapshot().await;
            if snapshot.state != SessionState::Destroyed {
                snapshots.push(snapshot);
            }
        }
        snapshots.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        snapshots
    }

    /// Restarts every persisted session with no attached caller.
    ///
    /// Ids that are already live are skipped. Returns how many were started.
    pub async fn restore_sessions(&self) -> Result<usize, WamuxError> {
        let rows = self.ctx.storage.list_session_configs().await?;
        let mut restored = 0;
        for row in rows {
            if self.ctx.registry.contains(&row.session_id).await {
                debug!(session_id = %row.session_id, "already live, not restoring");
                continue;
            }
            let options = match row.parse_options() {
                Ok(options) => options,
                Err(e) => {
                    warn!(session_id = %row.session_id, error = %e, "unreadable session options, using defaults");
                    SessionOptions::default()
                }
            };
            match self
                .reserve(&row.session_id, &row.device_id, &options, DeliveryMode::None)
                .await
            {
                Ok((session, _)) => {
                    self.launch(&session, DeliveryMode::None).await;
                    restored += 1;
                }
                Err(e) => warn!(session_id = %row.session_id, error = %e, "failed to restore session"),
            }
        }
        info!(restored, "sessions restored");
        Ok(restored)
    }

    /// Stops every dispatcher without tearing sessions down.
    ///
    /// Configuration rows and credentials are kept for the next
    /// [`restore_sessions`](Self::restore_sessions).
    pub async fn shutdown(&self, timeout: Duration) {
        let sessions = self.ctx.registry.drain().await;
        for session in &sessions {
            session.cancel_token().cancel();
        }
        for session in &sessions {
            if let Some(handle) = session.take_dispatcher().await {
                match tokio::time::timeout(timeout, handle).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(session_id = %session.session_id(), error = %e, "dispatcher ended abnormally"),
                    Err(_) => warn!(session_id = %session.session_id(), "dispatcher did not stop in time"),
                }
            }
            match session.take_sink().await {
                QrSink::Stream(tx) => {
                    let _ = tx.try_send(QrEvent::Error {
                        reason: "service shutting down".to_string(),
                    });
                }
                QrSink::Single(tx) => {
                    let _ = tx.send(Err(WamuxError::PairingFailed {
                        session_id: session.session_id().to_string(),
                        reason: "service shutting down".to_string(),
                    }));
                }
                QrSink::None => {}
            }
            if let Some(client) = session.take_client().await {
                client.close().await;
            }
        }
        self.ctx.supervisor.drain(timeout).await;
        info!(sessions = sessions.len(), "session manager shut down");
    }
}

/// Builder returned by [`SessionManager::builder`].
pub struct SessionManagerBuilder {
    storage: Arc<dyn StorageAdapter>,
    credentials: Arc<dyn CredentialStore>,
    connector: Arc<dyn ProtocolConnector>,
    bus: Option<EventBus>,
    hooks: Vec<Arc<dyn InboundHook>>,
    session_config: SessionConfig,
}

impl SessionManagerBuilder {
    /// Publishes on `bus` instead of a private one.
    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Adds an inbound-message collaborator.
    pub fn hook(mut self, hook: Arc<dyn InboundHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Adds several collaborators at once.
    pub fn hooks(mut self, hooks: impl IntoIterator<Item = Arc<dyn InboundHook>>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Service-wide budgets and the scoped storage root.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Without a bus, the manager creates one with the default capacity.
    pub fn build(self) -> SessionManager {
        let bus = self.bus.unwrap_or_default();
        let reconciler = StatusReconciler::new(Arc::clone(&self.storage), bus.clone());
        let sessions_dir = PathBuf::from(&self.session_config.sessions_dir);
        SessionManager {
            ctx: Arc::new(SessionContext {
                storage: self.storage,
                credentials: self.credentials,
                connector: self.connector,
                bus,
                hooks: self.hooks,
                supervisor: Supervisor::new(),
                registry: SessionRegistry::new(),
                reconciler,
                defaults: self.session_config,
                sessions_dir,
            }),
        }
    }
}
