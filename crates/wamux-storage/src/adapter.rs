// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage and credential traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use wamux_config::model::StorageConfig;
use wamux_core::protocol::{Credentials, Reaction, Receipt};
use wamux_core::{
    AdapterType, CredentialStore, DeviceRecord, DeviceStatus, GroupRecord, HealthStatus,
    PluginAdapter, SessionConfigRow, StatusLevel, StatusOutcome, StorageAdapter, StoredMessage,
    WamuxError,
};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened lazily by [`StorageAdapter::initialize`]; every
/// other call fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, WamuxError> {
        self.db.get().ok_or_else(|| WamuxError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    async fn checkpoint(&self) -> Result<(), WamuxError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, WamuxError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), WamuxError> {
        if self.db.get().is_some() {
            self.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), WamuxError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| WamuxError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), WamuxError> {
        self.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn save_session_config(&self, row: &SessionConfigRow) -> Result<(), WamuxError> {
        queries::sessions::save_session_config(self.db()?, row).await
    }

    async fn list_session_configs(&self) -> Result<Vec<SessionConfigRow>, WamuxError> {
        queries::sessions::list_session_configs(self.db()?).await
    }

    async fn delete_session_config(&self, session_id: &str) -> Result<(), WamuxError> {
        queries::sessions::delete_session_config(self.db()?, session_id).await
    }

    async fn upsert_message(&self, message: &StoredMessage) -> Result<(), WamuxError> {
        queries::messages::upsert_message(self.db()?, message).await
    }

    async fn get_message(
        &self,
        session_id: &str,
        remote_jid: &str,
        message_id: &str,
    ) -> Result<Option<StoredMessage>, WamuxError> {
        queries::messages::get_message(self.db()?, session_id, remote_jid, message_id).await
    }

    async fn mark_messages_deleted(
        &self,
        session_id: &str,
        keys: &[(String, String)],
    ) -> Result<usize, WamuxError> {
        queries::messages::mark_messages_deleted(self.db()?, session_id, keys).await
    }

    async fn mark_chat_deleted(
        &self,
        session_id: &str,
        remote_jid: &str,
    ) -> Result<usize, WamuxError> {
        queries::messages::mark_chat_deleted(self.db()?, session_id, remote_jid).await
    }

    async fn merge_receipt(
        &self,
        session_id: &str,
        remote_jid: &str,
        message_id: &str,
        receipt: &Receipt,
    ) -> Result<bool, WamuxError> {
        queries::messages::merge_receipt(self.db()?, session_id, remote_jid, message_id, receipt)
            .await
    }

    async fn merge_reaction(
        &self,
        session_id: &str,
        remote_jid: &str,
        message_id: &str,
        reaction: &Reaction,
    ) -> Result<bool, WamuxError> {
        queries::messages::merge_reaction(self.db()?, session_id, remote_jid, message_id, reaction)
            .await
    }

    async fn detach_messages(&self, session_id: &str) -> Result<usize, WamuxError> {
        queries::messages::detach_messages(self.db()?, session_id).await
    }

    async fn advance_status(
        &self,
        session_id: &str,
        remote_jid: &str,
        message_id: &str,
        level: StatusLevel,
    ) -> Result<StatusOutcome, WamuxError> {
        queries::outgoing::advance_status(self.db()?, session_id, remote_jid, message_id, level)
            .await
    }

    async fn get_status(&self, message_id: &str) -> Result<Option<StatusLevel>, WamuxError> {
        queries::outgoing::get_status(self.db()?, message_id).await
    }

    async fn replace_groups(
        &self,
        device_id: &str,
        groups: &[GroupRecord],
    ) -> Result<(), WamuxError> {
        queries::groups::replace_groups(self.db()?, device_id, groups).await
    }

    async fn upsert_group(&self, group: &GroupRecord) -> Result<(), WamuxError> {
        queries::groups::upsert_group(self.db()?, group).await
    }

    async fn refresh_group(
        &self,
        device_id: &str,
        group_id: &str,
        group_name: &str,
        participants_count: i64,
    ) -> Result<bool, WamuxError> {
        queries::groups::refresh_group(
            self.db()?,
            device_id,
            group_id,
            group_name,
            participants_count,
        )
        .await
    }

    async fn set_group_active(
        &self,
        device_id: &str,
        group_id: &str,
        active: bool,
    ) -> Result<bool, WamuxError> {
        queries::groups::set_group_active(self.db()?, device_id, group_id, active).await
    }

    async fn list_groups(
        &self,
        device_id: &str,
        active_only: bool,
    ) -> Result<Vec<GroupRecord>, WamuxError> {
        queries::groups::list_groups(self.db()?, device_id, active_only).await
    }

    async fn update_device_status(
        &self,
        device_id: &str,
        status: DeviceStatus,
        phone: Option<&str>,
    ) -> Result<(), WamuxError> {
        queries::devices::update_device_status(self.db()?, device_id, status, phone).await
    }

    async fn get_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, WamuxError> {
        queries::devices::get_device(self.db()?, device_id).await
    }
}

#[async_trait]
impl CredentialStore for SqliteStorage {
    async fn load(&self, session_id: &str) -> Result<Option<Credentials>, WamuxError> {
        queries::credentials::load_credentials(self.db()?, session_id).await
    }

    async fn save(&self, session_id: &str, credentials: &Credentials) -> Result<(), WamuxError> {
        queries::credentials::save_credentials(self.db()?, session_id, credentials).await
    }

    async fn delete(&self, session_id: &str) -> Result<(), WamuxError> {
        queries::credentials::delete_credentials(self.db()?, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn calls_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.health_check().await.is_err());
        assert!(storage.list_session_configs().await.is_err());
        // Shutdown of a never-opened store is a no-op.
        storage.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn health_check_returns_healthy_when_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_status_updates_converge_on_maximum() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("cas.db");
        let storage = Arc::new(SqliteStorage::new(make_config(db_path.to_str().unwrap())));
        storage.initialize().await.unwrap();

        let levels = [
            StatusLevel::Read,
            StatusLevel::ServerAck,
            StatusLevel::Played,
            StatusLevel::DeliveryAck,
            StatusLevel::Pending,
        ];
        let mut handles = Vec::new();
        for level in levels {
            let storage = Arc::clone(&storage);
            handles.push(tokio::spawn(async move {
                storage
                    .advance_status("s1", "1@s.whatsapp.net", "m1", level)
                    .await
            }));
        }
        let mut advanced = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_advanced() {
                advanced += 1;
            }
        }
        assert!(advanced >= 1);
        assert_eq!(
            storage.get_status("m1").await.unwrap(),
            Some(StatusLevel::Played)
        );
    }

    #[tokio::test]
    async fn credential_store_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("creds.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let creds = Credentials(serde_json::json!({"me": {"id": "1@s.whatsapp.net"}}));
        CredentialStore::save(&storage, "s1", &creds).await.unwrap();
        assert_eq!(CredentialStore::load(&storage, "s1").await.unwrap(), Some(creds));
        CredentialStore::delete(&storage, "s1").await.unwrap();
        assert!(CredentialStore::load(&storage, "s1").await.unwrap().is_none());
    }
}
