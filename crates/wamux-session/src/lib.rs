// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-tenant session orchestration for the wamux service.
//!
//! A [`SessionManager`] owns one [`Session`] per tenant connection. Each
//! session runs a dispatcher task that connects through a
//! [`ProtocolConnector`](wamux_core::ProtocolConnector), delivers pairing QR
//! codes to the caller, bridges protocol events into storage and the
//! notification bus, reconnects within a retry budget and tears itself down
//! on terminal loss.

mod bridge;
mod context;
mod lifecycle;
pub mod manager;
pub mod qr;
pub mod reconciler;
pub mod registry;
pub mod session;
pub mod settings;
pub mod supervisor;
mod teardown;

pub use manager::{CreateOutcome, SessionManager, SessionManagerBuilder};
pub use qr::{render_qr_data_url, DeliveryMode, QrEvent, QrOutcome, QrStream};
pub use reconciler::StatusReconciler;
pub use registry::{Registry, SessionRegistry};
pub use session::{Session, SessionSnapshot};
pub use settings::SessionSettings;
pub use supervisor::Supervisor;
