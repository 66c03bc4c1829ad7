// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the wamux session orchestrator.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for session
//! configuration rows, messages, outgoing delivery status, the group cache,
//! device status and per-session credentials.
//!
//! All writes go through the one background thread owned by
//! [`Database`]. Query modules take `&Database` and never open their own
//! connection, which also makes the status compare-and-set atomic per
//! message id.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
