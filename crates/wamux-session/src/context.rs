// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborators shared by every session of one manager.

use std::path::PathBuf;
use std::sync::Arc;

use wamux_bus::EventBus;
use wamux_config::model::SessionConfig;
use wamux_core::{CredentialStore, InboundHook, ProtocolConnector, StorageAdapter};

use crate::reconciler::StatusReconciler;
use crate::registry::SessionRegistry;
use crate::supervisor::Supervisor;

pub(crate) struct SessionContext {
    pub storage: Arc<dyn StorageAdapter>,
    pub credentials: Arc<dyn CredentialStore>,
    pub connector: Arc<dyn ProtocolConnector>,
    pub bus: EventBus,
    pub hooks: Vec<Arc<dyn InboundHook>>,
    pub supervisor: Supervisor,
    pub registry: SessionRegistry,
    pub reconciler: StatusReconciler,
    /// Service-wide budgets, overridden per session.
    pub defaults: SessionConfig,
    /// Root of `<sessions_dir>/<session_id>/` scoped storage.
    pub sessions_dir: PathBuf,
}
