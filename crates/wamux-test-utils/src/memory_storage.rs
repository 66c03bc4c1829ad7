// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory storage and credential store.
//!
//! Mirrors the SQLite adapter's semantics (upsert keys, merge rules, status
//! compare-and-set) behind one mutex, and can be told to fail every write.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use wamux_core::protocol::{Credentials, Reaction, Receipt};
use wamux_core::records::{merge_reaction, merge_receipt, now_rfc3339};
use wamux_core::{
    AdapterType, CredentialStore, DeviceRecord, DeviceStatus, GroupRecord, HealthStatus,
    PluginAdapter, SessionConfigRow, StatusLevel, StatusOutcome, StorageAdapter, StoredMessage,
    WamuxError,
};

#[derive(Default)]
struct State {
    configs: BTreeMap<String, SessionConfigRow>,
    messages: Vec<StoredMessage>,
    outgoing: HashMap<String, StatusLevel>,
    groups: BTreeMap<(String, String), GroupRecord>,
    devices: HashMap<String, DeviceRecord>,
    credentials: HashMap<String, Credentials>,
}

impl State {
    fn message_mut(
        &mut self,
        session_id: &str,
        remote_jid: &str,
        message_id: &str,
    ) -> Option<&mut StoredMessage> {
        self.messages.iter_mut().find(|m| {
            m.session_id.as_deref() == Some(session_id)
                && m.remote_jid == remote_jid
                && m.message_id == message_id
        })
    }
}

/// Parks the next write of one device status until released.
///
/// Returned by [`MemoryStorage::hold_device_status`].
#[derive(Clone)]
pub struct StatusHold {
    status: DeviceStatus,
    entered: Arc<Notify>,
    released: Arc<Notify>,
}

impl StatusHold {
    /// Resolves once a write of the held status is parked.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets the parked write continue.
    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
    failing: AtomicBool,
    hold: std::sync::Mutex<Option<StatusHold>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every write fails with a storage error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), WamuxError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(WamuxError::storage("simulated write failure"));
        }
        Ok(())
    }

    /// Parks the next `update_device_status(_, status, _)` call until
    /// [`StatusHold::release`]. One-shot.
    pub fn hold_device_status(&self, status: DeviceStatus) -> StatusHold {
        let hold = StatusHold {
            status,
            entered: Arc::new(Notify::new()),
            released: Arc::new(Notify::new()),
        };
        if let Ok(mut slot) = self.hold.lock() {
            *slot = Some(hold.clone());
        }
        hold
    }

    fn take_hold(&self, status: DeviceStatus) -> Option<StatusHold> {
        let mut slot = self.hold.lock().ok()?;
        if slot.as_ref().is_some_and(|h| h.status == status) {
            slot.take()
        } else {
            None
        }
    }

    pub async fn message_count(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    /// Messages no longer attached to any session.
    pub async fn detached_count(&self) -> usize {
        self.state
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.session_id.is_none())
            .count()
    }
}

#[async_trait]
impl PluginAdapter for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, WamuxError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), WamuxError> {
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn initialize(&self) -> Result<(), WamuxError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), WamuxError> {
        Ok(())
    }

    async fn save_session_config(&self, row: &SessionConfigRow) -> Result<(), WamuxError> {
        self.check_writable()?;
        self.state
            .lock()
            .await
            .configs
            .insert(row.session_id.clone(), row.clone());
        Ok(())
    }

    async fn list_session_configs(&self) -> Result<Vec<SessionConfigRow>, WamuxError> {
        Ok(self.state.lock().await.configs.values().cloned().collect())
    }

    async fn delete_session_config(&self, session_id: &str) -> Result<(), WamuxError> {
        self.check_writable()?;
        self.state.lock().await.configs.remove(session_id);
        Ok(())
    }

    async fn upsert_message(&self, message: &StoredMessage) -> Result<(), WamuxError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let session_id = message.session_id.as_deref().unwrap_or_default();
        match state.message_mut(session_id, &message.remote_jid, &message.message_id) {
            Some(existing) => {
                let kept = (
                    std::mem::take(&mut existing.user_receipts),
                    std::mem::take(&mut existing.reactions),
                    existing.deleted,
                );
                *existing = message.clone();
                (existing.user_receipts, existing.reactions, existing.deleted) = kept;
            }
            None => state.messages.push(message.clone()),
        }
        Ok(())
    }

    async fn get_message(
        &self,
        session_id: &str,
        remote_jid: &str,
        message_id: &str,
    ) -> Result<Option<StoredMessage>, WamuxError> {
        Ok(self
            .state
            .lock()
            .await
            .message_mut(session_id, remote_jid, message_id)
            .map(|m| m.clone()))
    }

    async fn mark_messages_deleted(
        &self,
        session_id: &str,
        keys: &[(String, String)],
    ) -> Result<usize, WamuxError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let mut touched = 0;
        for (remote_jid, message_id) in keys {
            if let Some(message) = state.message_mut(session_id, remote_jid, message_id) {
                message.deleted = true;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn mark_chat_deleted(
        &self,
        session_id: &str,
        remote_jid: &str,
    ) -> Result<usize, WamuxError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let mut touched = 0;
        for message in state.messages.iter_mut().filter(|m| {
            m.session_id.as_deref() == Some(session_id) && m.remote_jid == remote_jid
        }) {
            message.deleted = true;
            touched += 1;
        }
        Ok(touched)
    }

    async fn merge_receipt(
        &self,
        session_id: &str,
        remote_jid: &str,
        message_id: &str,
        receipt: &Receipt,
    ) -> Result<bool, WamuxError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        Ok(match state.message_mut(session_id, remote_jid, message_id) {
            Some(message) => {
                merge_receipt(&mut message.user_receipts, receipt.clone());
                true
            }
            None => false,
        })
    }

    async fn merge_reaction(
        &self,
        session_id: &str,
        remote_jid: &str,
        message_id: &str,
        reaction: &Reaction,
    ) -> Result<bool, WamuxError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        Ok(match state.message_mut(session_id, remote_jid, message_id) {
            Some(message) => {
                merge_reaction(&mut message.reactions, reaction.clone());
                true
            }
            None => false,
        })
    }

    async fn detach_messages(&self, session_id: &str) -> Result<usize, WamuxError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let mut detached = 0;
        for message in state
            .messages
            .iter_mut()
            .filter(|m| m.session_id.as_deref() == Some(session_id))
        {
            message.session_id = None;
            detached += 1;
        }
        Ok(detached)
    }

    async fn advance_status(
        &self,
        _session_id: &str,
        _remote_jid: &str,
        message_id: &str,
        level: StatusLevel,
    ) -> Result<StatusOutcome, WamuxError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let previous = state.outgoing.get(message_id).copied();
        let stored = previous.unwrap_or(StatusLevel::Pending);
        if previous.is_none() || level.is_ahead_of(stored) {
            let current = if level.is_ahead_of(stored) {
                level
            } else {
                StatusLevel::Pending
            };
            state.outgoing.insert(message_id.to_string(), current);
            return Ok(StatusOutcome::Advanced { previous, current });
        }
        Ok(StatusOutcome::Discarded { current: stored })
    }

    async fn get_status(&self, message_id: &str) -> Result<Option<StatusLevel>, WamuxError> {
        Ok(self.state.lock().await.outgoing.get(message_id).copied())
    }

    async fn replace_groups(
        &self,
        device_id: &str,
        groups: &[GroupRecord],
    ) -> Result<(), WamuxError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        for ((device, _), group) in state.groups.iter_mut() {
            if device == device_id {
                group.is_active = false;
            }
        }
        for group in groups {
            let mut group = group.clone();
            group.is_active = true;
            state
                .groups
                .insert((device_id.to_string(), group.group_id.clone()), group);
        }
        Ok(())
    }

    async fn upsert_group(&self, group: &GroupRecord) -> Result<(), WamuxError> {
        self.check_writable()?;
        self.state.lock().await.groups.insert(
            (group.device_id.clone(), group.group_id.clone()),
            group.clone(),
        );
        Ok(())
    }

    async fn refresh_group(
        &self,
        device_id: &str,
        group_id: &str,
        group_name: &str,
        participants_count: i64,
    ) -> Result<bool, WamuxError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let key = (device_id.to_string(), group_id.to_string());
        Ok(match state.groups.get_mut(&key) {
            Some(group) => {
                group.group_name = group_name.to_string();
                group.participants_count = participants_count;
                true
            }
            None => false,
        })
    }

    async fn set_group_active(
        &self,
        device_id: &str,
        group_id: &str,
        active: bool,
    ) -> Result<bool, WamuxError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        Ok(
            match state
                .groups
                .get_mut(&(device_id.to_string(), group_id.to_string()))
            {
                Some(group) => {
                    group.is_active = active;
                    true
                }
                None => false,
            },
        )
    }

    async fn list_groups(
        &self,
        device_id: &str,
        active_only: bool,
    ) -> Result<Vec<GroupRecord>, WamuxError> {
        Ok(self
            .state
            .lock()
            .await
            .groups
            .values()
            .filter(|g| g.device_id == device_id && (!active_only || g.is_active))
            .cloned()
            .collect())
    }

    async fn update_device_status(
        &self,
        device_id: &str,
        status: DeviceStatus,
        phone: Option<&str>,
    ) -> Result<(), WamuxError> {
        if let Some(hold) = self.take_hold(status) {
            hold.entered.notify_one();
            hold.released.notified().await;
        }
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let record = state
            .devices
            .entry(device_id.to_string())
            .or_insert_with(|| DeviceRecord {
                device_id: device_id.to_string(),
                status,
                phone: None,
                updated_at: String::new(),
            });
        record.status = status;
        if let Some(phone) = phone {
            record.phone = Some(phone.to_string());
        }
        record.updated_at = now_rfc3339();
        Ok(())
    }

    async fn get_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, WamuxError> {
        Ok(self.state.lock().await.devices.get(device_id).cloned())
    }
}

#[async_trait]
impl CredentialStore for MemoryStorage {
    async fn load(&self, session_id: &str) -> Result<Option<Credentials>, WamuxError> {
        Ok(self.state.lock().await.credentials.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, credentials: &Credentials) -> Result<(), WamuxError> {
        self.check_writable()?;
        self.state
            .lock()
            .await
            .credentials
            .insert(session_id.to_string(), credentials.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), WamuxError> {
        self.check_writable()?;
        self.state.lock().await.credentials.remove(session_id);
        Ok(())
    }
}
