// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end session testing.
//!
//! `TestHarness` assembles a [`SessionManager`] over a scripted connector,
//! a temp directory for scoped session files, and either in-memory or
//! temp-file SQLite storage.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use wamux_bus::{BusEnvelope, BusReceiver, EventBus};
use wamux_config::model::{SessionConfig, StorageConfig};
use wamux_core::{CredentialStore, InboundHook, SessionState, StorageAdapter, WamuxError};
use wamux_session::SessionManager;
use wamux_storage::SqliteStorage;

use crate::memory_storage::MemoryStorage;
use crate::mock_protocol::{MockClient, MockConnector};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    sqlite: bool,
    session: SessionConfig,
    hooks: Vec<Arc<dyn InboundHook>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            sqlite: false,
            session: SessionConfig {
                reconnect_interval_ms: 10,
                ..SessionConfig::default()
            },
            hooks: Vec::new(),
        }
    }

    /// Use a temp-file SQLite database instead of [`MemoryStorage`].
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.session.max_retries = max_retries;
        self
    }

    pub fn reconnect_interval_ms(mut self, ms: u64) -> Self {
        self.session.reconnect_interval_ms = ms;
        self
    }

    pub fn max_qr_generations(mut self, max: u32) -> Self {
        self.session.max_qr_generations = max;
        self
    }

    pub fn hook(mut self, hook: Arc<dyn InboundHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, WamuxError> {
        let temp_dir = tempfile::TempDir::new().map_err(WamuxError::storage)?;
        let sessions_dir = temp_dir.path().join("sessions");
        let mut session = self.session;
        session.sessions_dir = sessions_dir.to_string_lossy().into_owned();

        let (storage, credentials, memory): (
            Arc<dyn StorageAdapter>,
            Arc<dyn CredentialStore>,
            Option<Arc<MemoryStorage>>,
        ) = if self.sqlite {
            let sqlite = Arc::new(SqliteStorage::new(StorageConfig {
                database_path: temp_dir.path().join("test.db").to_string_lossy().into_owned(),
                wal_mode: true,
            }));
            sqlite.initialize().await?;
            let storage: Arc<dyn StorageAdapter> = sqlite.clone();
            let credentials: Arc<dyn CredentialStore> = sqlite;
            (storage, credentials, None)
        } else {
            let memory = Arc::new(MemoryStorage::new());
            let storage: Arc<dyn StorageAdapter> = memory.clone();
            let credentials: Arc<dyn CredentialStore> = memory.clone();
            (storage, credentials, Some(memory))
        };

        let connector = Arc::new(MockConnector::new());
        let client = connector.client();
        let bus = EventBus::new(256);
        let manager = SessionManager::builder(storage.clone(), credentials.clone(), connector.clone())
            .bus(bus.clone())
            .hooks(self.hooks)
            .session_config(session)
            .build();

        Ok(TestHarness {
            manager,
            connector,
            client,
            storage,
            credentials,
            memory,
            bus,
            sessions_dir,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete session environment with mock protocol and temp storage.
pub struct TestHarness {
    pub manager: SessionManager,
    pub connector: Arc<MockConnector>,
    /// The client shared by every connection attempt.
    pub client: Arc<MockClient>,
    pub storage: Arc<dyn StorageAdapter>,
    pub credentials: Arc<dyn CredentialStore>,
    /// Set unless the harness was built [`with_sqlite`](TestHarnessBuilder::with_sqlite).
    pub memory: Option<Arc<MemoryStorage>>,
    pub bus: EventBus,
    pub sessions_dir: PathBuf,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn subscribe(&self) -> BusReceiver {
        self.bus.subscribe()
    }

    /// Polls until the session reports `state`. `false` on timeout.
    pub async fn wait_for_state(&self, session_id: &str, state: SessionState) -> bool {
        let wait = async {
            loop {
                if let Ok(current) = self.manager.session_status(session_id).await
                    && current == state
                {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait).await.is_ok()
    }

    /// Polls until the session is no longer registered. `false` on timeout.
    pub async fn wait_until_gone(&self, session_id: &str) -> bool {
        let wait = async {
            while self.manager.get_session(session_id).await.is_ok() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait).await.is_ok()
    }

    /// Next bus event whose topic is `topic`, skipping others. `None` on timeout.
    pub async fn next_on_topic(rx: &mut BusReceiver, topic: &str) -> Option<BusEnvelope> {
        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(envelope) if envelope.topic() == topic => return Some(envelope),
                    Ok(_) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .ok()
            .flatten()
    }
}
