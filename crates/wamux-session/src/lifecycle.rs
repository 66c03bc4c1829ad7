// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session dispatcher: connect, consume events in order, reconnect.
//!
//! One task per session runs [`run`]. It owns the state transitions
//! `Initializing -> AwaitingPairing -> Open -> Reconnecting -> Destroyed`
//! and is the only writer of the retry and QR counters.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wamux_core::jid::normalize_jid;
use wamux_core::protocol::{ConnectionUpdate, ProtocolEvent};
use wamux_core::{Connection, DeviceStatus, DisconnectReason, SessionState, WamuxError};

use crate::bridge;
use crate::qr::{render_qr_data_url, QrEvent, QrOutcome, QrSink};
use crate::session::Session;
use crate::settings::SessionSettings;
use crate::teardown;

/// What to do after the connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseDecision {
    /// Reconnect after `delay`. `counted` closes consume one retry.
    Retry { delay: Duration, counted: bool },
    /// Report the loss and tear the session down.
    Terminal,
}

/// Pure close policy.
pub(crate) fn decide_close(
    reason: DisconnectReason,
    retry_count: u32,
    settings: &SessionSettings,
) -> CloseDecision {
    if reason.is_logout() {
        return CloseDecision::Terminal;
    }
    if retry_count >= settings.max_retries {
        return CloseDecision::Terminal;
    }
    if reason.requires_immediate_restart() {
        return CloseDecision::Retry {
            delay: Duration::ZERO,
            counted: false,
        };
    }
    CloseDecision::Retry {
        delay: settings.reconnect_interval,
        counted: true,
    }
}

/// How one connection attempt ended.
enum Flow {
    /// The dispatcher must exit (cancelled or already torn down).
    Stop,
    Closed(DisconnectReason),
}

/// Dispatcher loop of one session. Returns when the session is cancelled or
/// destroyed.
pub(crate) async fn run(session: Arc<Session>) {
    let cancel = session.cancel_token();
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let flow = match connect(&session).await {
            Ok(Some(connection)) => drive(&session, connection).await,
            Ok(None) => Flow::Stop,
            Err(e) => {
                warn!(error = %e, "connection attempt failed");
                Flow::Closed(DisconnectReason::ConnectionFailure)
            }
        };
        let reason = match flow {
            Flow::Stop => break,
            Flow::Closed(reason) => reason,
        };
        if cancel.is_cancelled() {
            break;
        }
        if let Some(client) = session.take_client().await {
            client.close().await;
        }

        let decision = {
            let mut inner = session.inner.lock().await;
            let decision = decide_close(reason, inner.retry_count, session.settings());
            if let CloseDecision::Retry { counted, .. } = decision {
                if counted {
                    inner.retry_count += 1;
                }
                inner.state = SessionState::Reconnecting;
            }
            decision
        };

        match decision {
            CloseDecision::Retry { delay, counted } => {
                info!(
                    reason = %reason,
                    delay_ms = delay.as_millis() as u64,
                    counted,
                    "connection closed, reconnecting"
                );
                session
                    .fail_pending_reply(&format!("connection closed before pairing: {reason}"))
                    .await;
                let stream_tx = session.stream_sender().await;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = stream_dropped(stream_tx) => {
                        info!("QR stream receiver dropped, tearing session down");
                        teardown::destroy(&session, true).await;
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            CloseDecision::Terminal => {
                warn!(reason = %reason, "connection lost for good");
                report_terminal(&session, reason).await;
                teardown::destroy(&session, false).await;
                break;
            }
        }
    }
    debug!("dispatcher exited");
}

/// Opens one connection. `Ok(None)` when the session was cancelled meanwhile.
async fn connect(session: &Arc<Session>) -> Result<Option<Connection>, WamuxError> {
    let ctx = &session.ctx;
    let session_id = session.session_id();
    let credentials = match ctx.credentials.load(session_id).await {
        Ok(credentials) => credentials,
        Err(e) => {
            warn!(error = %e, "failed to load credentials, pairing from scratch");
            None
        }
    };
    debug!(has_credentials = credentials.is_some(), "connecting");
    let connection = ctx.connector.connect(session_id, credentials).await?;

    session.attach_client(connection.client.clone()).await;
    if session.cancel_token().is_cancelled() {
        if let Some(client) = session.take_client().await {
            client.close().await;
        }
        return Ok(None);
    }
    Ok(Some(connection))
}

/// Consumes the connection's events in arrival order.
async fn drive(session: &Arc<Session>, connection: Connection) -> Flow {
    let cancel = session.cancel_token();
    let mut events = connection.events;
    loop {
        let stream_tx = session.stream_sender().await;
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Flow::Stop,
            _ = stream_dropped(stream_tx) => {
                info!("QR stream receiver dropped, tearing session down");
                teardown::destroy(session, true).await;
                return Flow::Stop;
            }
            event = events.recv() => event,
        };
        let Some(event) = event else {
            return Flow::Closed(DisconnectReason::ConnectionClosed);
        };

        match event {
            ProtocolEvent::ConnectionUpdate(update) => match update {
                ConnectionUpdate::Connecting => {
                    session
                        .set_device_status(DeviceStatus::Connecting, None)
                        .await;
                }
                ConnectionUpdate::Qr(qr) => {
                    if !handle_qr(session, qr).await {
                        return Flow::Stop;
                    }
                }
                ConnectionUpdate::Open { jid } => {
                    handle_open(session, &jid).await;
                    if session.is_destroyed() {
                        return Flow::Stop;
                    }
                }
                ConnectionUpdate::Close { reason } => return Flow::Closed(reason),
            },
            ProtocolEvent::CredsUpdate(credentials) => {
                if let Err(e) = session
                    .ctx
                    .credentials
                    .save(session.session_id(), &credentials)
                    .await
                {
                    warn!(error = %e, "failed to persist rotated credentials");
                }
            }
            other => bridge::handle_event(session, other).await,
        }
    }
}

/// Resolves once the streaming caller has gone away. Never resolves without one.
async fn stream_dropped(tx: Option<mpsc::Sender<QrEvent>>) {
    match tx {
        Some(tx) => tx.closed().await,
        None => std::future::pending().await,
    }
}

/// Counts, renders and delivers one pairing payload. `false` once the
/// session has been torn down.
async fn handle_qr(session: &Arc<Session>, qr: String) -> bool {
    let generation = {
        let mut inner = session.inner.lock().await;
        if session.is_destroyed() {
            return false;
        }
        if inner.qr_generation_count >= session.settings().max_qr_generations {
            None
        } else {
            inner.qr_generation_count += 1;
            inner.state = SessionState::AwaitingPairing;
            Some(inner.qr_generation_count)
        }
    };

    let Some(generation) = generation else {
        info!(
            max_qr_generations = session.settings().max_qr_generations,
            "QR budget spent, abandoning pairing"
        );
        match session.take_sink().await {
            QrSink::Stream(tx) => {
                let _ = tx.send(QrEvent::MaxGenerationsReached).await;
            }
            QrSink::Single(tx) => {
                let _ = tx.send(Err(WamuxError::PairingFailed {
                    session_id: session.session_id().to_string(),
                    reason: "maximum QR generations reached".to_string(),
                }));
            }
            QrSink::None => {}
        }
        teardown::destroy(session, true).await;
        return false;
    };

    if generation == 1 {
        session.set_device_status(DeviceStatus::Pairing, None).await;
    }

    let data_url = match render_qr_data_url(&qr) {
        Ok(url) => url,
        Err(e) => {
            warn!(generation, error = %e, "failed to render QR code, skipping");
            return true;
        }
    };
    debug!(generation, "QR code generated");

    if !session.deliver_qr(qr, data_url, generation).await {
        info!("QR stream receiver dropped, tearing session down");
        teardown::destroy(session, true).await;
        return false;
    }
    true
}

async fn handle_open(session: &Arc<Session>, jid: &str) {
    let own_jid = normalize_jid(jid);
    {
        let mut inner = session.inner.lock().await;
        if session.is_destroyed() {
            return;
        }
        inner.state = SessionState::Open;
        inner.retry_count = 0;
        inner.qr_generation_count = 0;
        inner.own_jid = Some(own_jid.clone());
    }
    info!(jid = %own_jid, "session open");

    let phone = own_jid.split('@').next().filter(|p| !p.is_empty());
    session
        .set_device_status(DeviceStatus::Connected, phone)
        .await;
    if session.is_destroyed() {
        debug!("torn down while opening");
        return;
    }

    match session.take_sink().await {
        QrSink::Single(tx) => {
            let _ = tx.send(Ok(QrOutcome::AlreadyConnected));
        }
        QrSink::Stream(tx) => {
            let _ = tx.send(QrEvent::Connected).await;
        }
        QrSink::None => {}
    }

    let resync = Arc::clone(session);
    session.ctx.supervisor.dispatch(
        format!("group-resync:{}", session.session_id()),
        async move {
            if resync.is_destroyed() {
                return Ok(());
            }
            bridge::resync_groups(&resync).await.map(|_| ())
        },
    );
}

/// Reports a terminal loss to whoever is still attached.
async fn report_terminal(session: &Arc<Session>, reason: DisconnectReason) {
    match session.take_sink().await {
        QrSink::Single(tx) => {
            let _ = tx.send(Err(WamuxError::PairingFailed {
                session_id: session.session_id().to_string(),
                reason: format!("connection closed: {reason}"),
            }));
        }
        QrSink::Stream(tx) => {
            let _ = tx
                .send(QrEvent::Error {
                    reason: format!("connection closed: {reason}"),
                })
                .await;
        }
        QrSink::None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(max_retries: u32) -> SessionSettings {
        SessionSettings {
            max_retries,
            reconnect_interval: Duration::from_millis(250),
            max_qr_generations: 3,
            qr_buffer: 4,
        }
    }

    #[test]
    fn recoverable_close_is_counted() {
        assert_eq!(
            decide_close(DisconnectReason::ConnectionLost, 0, &settings(2)),
            CloseDecision::Retry {
                delay: Duration::from_millis(250),
                counted: true
            }
        );
    }

    #[test]
    fn exhausted_budget_is_terminal() {
        assert_eq!(
            decide_close(DisconnectReason::ConnectionLost, 2, &settings(2)),
            CloseDecision::Terminal
        );
        assert_eq!(
            decide_close(DisconnectReason::Other(499), 0, &settings(0)),
            CloseDecision::Terminal
        );
    }

    #[test]
    fn logout_is_always_terminal() {
        assert_eq!(
            decide_close(DisconnectReason::LoggedOut, 0, &settings(5)),
            CloseDecision::Terminal
        );
    }

    #[test]
    fn restart_required_reconnects_at_once() {
        assert_eq!(
            decide_close(DisconnectReason::RestartRequired, 4, &settings(5)),
            CloseDecision::Retry {
                delay: Duration::ZERO,
                counted: false
            }
        );
    }

    #[test]
    fn restart_required_respects_exhausted_budget() {
        assert_eq!(
            decide_close(DisconnectReason::RestartRequired, 5, &settings(5)),
            CloseDecision::Terminal
        );
        assert_eq!(
            decide_close(DisconnectReason::RestartRequired, 0, &settings(0)),
            CloseDecision::Terminal
        );
    }

    #[test]
    fn connector_failures_are_recoverable() {
        assert!(matches!(
            decide_close(DisconnectReason::ConnectionFailure, 1, &settings(3)),
            CloseDecision::Retry { counted: true, .. }
        ));
    }
}
