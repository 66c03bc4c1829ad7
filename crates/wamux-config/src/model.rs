// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level wamux configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WamuxConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Session lifecycle budgets.
    #[serde(default)]
    pub session: SessionConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Notification bus settings.
    #[serde(default)]
    pub bus: BusConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "wamux".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Session lifecycle configuration.
///
/// Every value here can be overridden per session through the persisted
/// startup options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Recoverable closes tolerated before a session is destroyed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before a reconnect attempt, in milliseconds.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Pairing payloads streamed before pairing is abandoned.
    #[serde(default = "default_max_qr_generations")]
    pub max_qr_generations: u32,

    /// Root of the per-session scoped file storage.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: String,

    /// Capacity of each QR stream channel.
    #[serde(default = "default_qr_buffer")]
    pub qr_buffer: usize,
}

impl SessionConfig {
    /// [`reconnect_interval_ms`](Self::reconnect_interval_ms) as a duration.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_qr_generations: default_max_qr_generations(),
            sessions_dir: default_sessions_dir(),
            qr_buffer: default_qr_buffer(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_reconnect_interval_ms() -> u64 {
    5_000
}

fn default_max_qr_generations() -> u32 {
    5
}

fn default_sessions_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("wamux").join("sessions"))
        .unwrap_or_else(|| std::path::PathBuf::from("sessions"))
        .to_string_lossy()
        .into_owned()
}

fn default_qr_buffer() -> usize {
    8
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("wamux").join("wamux.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("wamux.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Notification bus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Events buffered per subscriber before the slowest one starts lagging.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_capacity() -> usize {
    1024
}
