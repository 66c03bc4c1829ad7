// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wamux sessions` command implementation.
//!
//! Reads the persisted session rows and the last recorded device status
//! straight from storage. Nothing is connected.

use serde::Serialize;
use wamux_config::model::WamuxConfig;
use wamux_core::{StorageAdapter, WamuxError};
use wamux_storage::SqliteStorage;

/// One line of output.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SessionRow {
    pub session_id: String,
    pub device_id: String,
    /// Last persisted device status; `None` if the device never connected.
    pub status: Option<String>,
    pub phone: Option<String>,
    pub created_at: String,
}

/// Collects every persisted session with its device status.
pub async fn collect_rows(storage: &dyn StorageAdapter) -> Result<Vec<SessionRow>, WamuxError> {
    let mut rows = Vec::new();
    for config in storage.list_session_configs().await? {
        let device = storage.get_device(&config.device_id).await?;
        rows.push(SessionRow {
            status: device.as_ref().map(|d| d.status.to_string()),
            phone: device.and_then(|d| d.phone),
            session_id: config.session_id,
            device_id: config.device_id,
            created_at: config.created_at,
        });
    }
    Ok(rows)
}

/// Run the `wamux sessions` command.
pub async fn run_sessions(config: &WamuxConfig, json: bool) -> Result<(), WamuxError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let rows = collect_rows(&storage).await;
    storage.close().await?;
    let rows = rows?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("no persisted sessions");
        return Ok(());
    }
    println!(
        "{:<24} {:<24} {:<14} {:<16} CREATED",
        "SESSION", "DEVICE", "STATUS", "PHONE"
    );
    for row in rows {
        println!(
            "{:<24} {:<24} {:<14} {:<16} {}",
            row.session_id,
            row.device_id,
            row.status.as_deref().unwrap_or("-"),
            row.phone.as_deref().unwrap_or("-"),
            row.created_at
        );
    }
    Ok(())
}
