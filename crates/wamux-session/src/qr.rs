// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! QR code delivery to the caller that started a session.
//!
//! A session has at most one delivery target, chosen when it is created:
//! a one-shot reply ([`DeliveryMode::Single`]), a stream of events
//! ([`DeliveryMode::Stream`]) or nobody ([`DeliveryMode::None`], used for
//! restored sessions).

use std::pin::Pin;
use std::task::{Context, Poll};

use base64::Engine;
use futures::Stream;
use qrcode::render::svg;
use qrcode::QrCode;
use tokio::sync::{mpsc, oneshot};
use wamux_core::WamuxError;

/// How pairing payloads reach the caller of `create_session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Reply once with the first QR code.
    #[default]
    Single,
    /// Push every QR code until the session opens or pairing is abandoned.
    Stream,
    /// No caller is attached.
    None,
}

/// The single reply of [`DeliveryMode::Single`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrOutcome {
    Qr { qr: String, data_url: String },
    /// Stored credentials were valid; no pairing was needed.
    AlreadyConnected,
}

/// One item of a [`QrStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrEvent {
    Qr {
        qr: String,
        data_url: String,
        generation: u32,
    },
    /// The pairing budget is spent. The stream ends after this event.
    MaxGenerationsReached,
    /// The session opened. The stream ends after this event.
    Connected,
    /// The session was lost for good. The stream ends after this event.
    Error { reason: String },
}

impl QrEvent {
    /// True for every event that ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QrEvent::Qr { .. })
    }
}

/// Receiving side of a streaming `create_session`.
///
/// Dropping the stream before it ends tears the session down.
pub struct QrStream {
    session_id: String,
    rx: mpsc::Receiver<QrEvent>,
}

impl QrStream {
    pub(crate) fn new(session_id: String, rx: mpsc::Receiver<QrEvent>) -> Self {
        Self { session_id, rx }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Next event, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<QrEvent> {
        self.rx.recv().await
    }
}

impl std::fmt::Debug for QrStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrStream")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl Stream for QrStream {
    type Item = QrEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Where the lifecycle controller sends pairing output.
pub(crate) enum QrSink {
    Single(oneshot::Sender<Result<QrOutcome, WamuxError>>),
    Stream(mpsc::Sender<QrEvent>),
    None,
}

/// Builds the sink/receiver pair for `mode`.
pub(crate) fn channel(
    mode: DeliveryMode,
    session_id: &str,
    buffer: usize,
) -> (QrSink, PendingReply) {
    match mode {
        DeliveryMode::Single => {
            let (tx, rx) = oneshot::channel();
            (QrSink::Single(tx), PendingReply::Single(rx))
        }
        DeliveryMode::Stream => {
            let (tx, rx) = mpsc::channel(buffer.max(1));
            (
                QrSink::Stream(tx),
                PendingReply::Stream(QrStream::new(session_id.to_string(), rx)),
            )
        }
        DeliveryMode::None => (QrSink::None, PendingReply::None),
    }
}

/// Caller-side counterpart of a [`QrSink`].
pub(crate) enum PendingReply {
    Single(oneshot::Receiver<Result<QrOutcome, WamuxError>>),
    Stream(QrStream),
    None,
}

/// Renders a pairing payload as a `data:image/svg+xml;base64,...` URL.
pub fn render_qr_data_url(payload: &str) -> Result<String, WamuxError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| WamuxError::Internal(format!("cannot encode QR payload: {e}")))?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .build();
    let encoded = base64::engine::general_purpose::STANDARD.encode(image.as_bytes());
    Ok(format!("data:image/svg+xml;base64,{encoded}"))
}
