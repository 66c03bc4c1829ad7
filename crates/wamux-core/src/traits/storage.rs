// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the session layer's persisted state.

use async_trait::async_trait;

use crate::error::WamuxError;
use crate::protocol::{Reaction, Receipt};
use crate::records::{
    DeviceRecord, GroupRecord, SessionConfigRow, StatusOutcome, StoredMessage,
};
use crate::traits::adapter::PluginAdapter;
use crate::types::{DeviceStatus, StatusLevel};

/// Persistence for session configuration rows, messages, outgoing status,
/// the group cache and device status.
///
/// Rows are partitioned by `session_id` / `device_id`. The only operation
/// that must be atomic across concurrent callers is
/// [`advance_status`](StorageAdapter::advance_status).
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connections, ...).
    async fn initialize(&self) -> Result<(), WamuxError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), WamuxError>;

    // --- Session configuration ---

    /// Inserts or replaces the configuration row for a session.
    async fn save_session_config(&self, row: &SessionConfigRow) -> Result<(), WamuxError>;

    async fn list_session_configs(&self) -> Result<Vec<SessionConfigRow>, WamuxError>;

    async fn delete_session_config(&self, session_id: &str) -> Result<(), WamuxError>;

    // --- Messages ---

    /// Upserts by `(session_id, remote_jid, message_id)`.
    ///
    /// Receipts, reactions and the deleted flag of an existing row are kept.
    async fn upsert_message(&self, message: &StoredMessage) -> Result<(), WamuxError>;

    async fn get_message(
        &self,
        session_id: &str,
        remote_jid: &str,
        message_id: &str,
    ) -> Result<Option<StoredMessage>, WamuxError>;

    /// Soft-deletes the addressed messages. Returns the number of rows touched.
    async fn mark_messages_deleted(
        &self,
        session_id: &str,
        keys: &[(String, String)],
    ) -> Result<usize, WamuxError>;

    /// Soft-deletes every message of one chat.
    async fn mark_chat_deleted(
        &self,
        session_id: &str,
        remote_jid: &str,
    ) -> Result<usize, WamuxError>;

    /// Merges a receipt into the message. `false` if the message is unknown.
    async fn merge_receipt(
        &self,
        session_id: &str,
        remote_jid: &str,
        message_id: &str,
        receipt: &Receipt,
    ) -> Result<bool, WamuxError>;

    /// Merges a reaction into the message. `false` if the message is unknown.
    async fn merge_reaction(
        &self,
        session_id: &str,
        remote_jid: &str,
        message_id: &str,
        reaction: &Reaction,
    ) -> Result<bool, WamuxError>;

    /// Clears the session reference on every message of the session.
    async fn detach_messages(&self, session_id: &str) -> Result<usize, WamuxError>;

    // --- Outgoing status ---

    /// Compare-and-set on the outgoing status ladder.
    ///
    /// Creates the row at `pending` if it does not exist, then raises it to
    /// `level` only if `level` is strictly above the stored value.
    async fn advance_status(
        &self,
        session_id: &str,
        remote_jid: &str,
        message_id: &str,
        level: StatusLevel,
    ) -> Result<StatusOutcome, WamuxError>;

    async fn get_status(&self, message_id: &str) -> Result<Option<StatusLevel>, WamuxError>;

    // --- Groups ---

    /// Full resync: deactivates every row of the device, then upserts `groups`
    /// as active.
    async fn replace_groups(
        &self,
        device_id: &str,
        groups: &[GroupRecord],
    ) -> Result<(), WamuxError>;

    async fn upsert_group(&self, group: &GroupRecord) -> Result<(), WamuxError>;

    /// Updates name and participant count of an existing row, leaving its
    /// active flag alone. `false` if no such row exists.
    async fn refresh_group(
        &self,
        device_id: &str,
        group_id: &str,
        group_name: &str,
        participants_count: i64,
    ) -> Result<bool, WamuxError>;

    /// Flips one row. `false` if no such row exists.
    async fn set_group_active(
        &self,
        device_id: &str,
        group_id: &str,
        active: bool,
    ) -> Result<bool, WamuxError>;

    async fn list_groups(
        &self,
        device_id: &str,
        active_only: bool,
    ) -> Result<Vec<GroupRecord>, WamuxError>;

    // --- Devices ---

    /// Records the device status. `phone` is only overwritten when `Some`.
    async fn update_device_status(
        &self,
        device_id: &str,
        status: DeviceStatus,
        phone: Option<&str>,
    ) -> Result<(), WamuxError>;

    async fn get_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, WamuxError>;
}
