// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wamux doctor` command implementation.
//!
//! Runs diagnostic checks against the wamux environment: configuration,
//! storage, the scoped session directory and QR rendering.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use wamux_config::model::WamuxConfig;
use wamux_core::{HealthStatus, PluginAdapter, StorageAdapter, WamuxError};
use wamux_storage::SqliteStorage;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Short label printed first.
    pub name: String,
    pub status: CheckStatus,
    /// One-line detail.
    pub message: String,
    /// Time the check took.
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `wamux doctor` command.
///
/// With `plain`, or when stdout is not a terminal, output is not colored.
pub async fn run_doctor(
    config: &WamuxConfig,
    config_path: Option<&Path>,
    plain: bool,
) -> Result<(), WamuxError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let results = vec![
        check_config(config_path),
        check_database(config).await,
        check_sessions_dir(&config.session.sessions_dir),
        check_qr_renderer(),
    ];

    println!();
    println!("  wamux doctor");
    println!("  {}", "-".repeat(50));

    let mut issues = 0;
    for result in &results {
        let duration_ms = result.duration.as_millis();
        let line = if use_color {
            use colored::Colorize;
            let (symbol, message) = match result.status {
                CheckStatus::Pass => ("✓".green().to_string(), result.message.normal()),
                CheckStatus::Warn => ("!".yellow().to_string(), result.message.yellow()),
                CheckStatus::Fail => ("✗".red().to_string(), result.message.red()),
            };
            format!("    {symbol} {:<20} {message} ({duration_ms}ms)", result.name)
        } else {
            let tag = match result.status {
                CheckStatus::Pass => "[OK]  ",
                CheckStatus::Warn => "[WARN]",
                CheckStatus::Fail => "[FAIL]",
            };
            format!("    {tag} {:<20} {} ({duration_ms}ms)", result.name, result.message)
        };
        if result.status != CheckStatus::Pass {
            issues += 1;
        }
        println!("{line}");
    }

    println!();
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(())
}

fn check_config(config_path: Option<&Path>) -> CheckResult {
    let start = Instant::now();
    let loaded = match config_path {
        Some(path) => wamux_config::load_and_validate_path(path),
        None => wamux_config::load_and_validate(),
    };
    match loaded {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Opens the database (running migrations) and runs the adapter health check.
async fn check_database(config: &WamuxConfig) -> CheckResult {
    let start = Instant::now();
    let path = &config.storage.database_path;
    if !Path::new(path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {path} (will be created on first run)"),
            start,
        );
    }

    let storage = SqliteStorage::new(config.storage.clone());
    if let Err(e) = storage.initialize().await {
        return CheckResult::new("Database", CheckStatus::Fail, format!("cannot open: {e}"), start);
    }
    let health = storage.health_check().await;
    if let Err(e) = storage.close().await {
        tracing::debug!(error = %e, "doctor: checkpoint on close failed");
    }
    match health {
        Ok(HealthStatus::Healthy) => {
            CheckResult::new("Database", CheckStatus::Pass, "connected", start)
        }
        Ok(HealthStatus::Degraded(reason)) => {
            CheckResult::new("Database", CheckStatus::Warn, reason, start)
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            CheckResult::new("Database", CheckStatus::Fail, reason, start)
        }
        Err(e) => CheckResult::new("Database", CheckStatus::Fail, e.to_string(), start),
    }
}

fn check_sessions_dir(dir: &str) -> CheckResult {
    let start = Instant::now();
    match std::fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => CheckResult::new(
            "Session files",
            CheckStatus::Fail,
            format!("{dir} is not a directory"),
            start,
        ),
        Ok(meta) if meta.permissions().readonly() => CheckResult::new(
            "Session files",
            CheckStatus::Fail,
            format!("{dir} is read-only"),
            start,
        ),
        Ok(_) => CheckResult::new("Session files", CheckStatus::Pass, dir.to_string(), start),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckResult::new(
            "Session files",
            CheckStatus::Warn,
            format!("not found: {dir} (will be created on first pairing)"),
            start,
        ),
        Err(e) => CheckResult::new("Session files", CheckStatus::Fail, e.to_string(), start),
    }
}

fn check_qr_renderer() -> CheckResult {
    let start = Instant::now();
    match wamux_session::render_qr_data_url("wamux-doctor") {
        Ok(_) => CheckResult::new("QR renderer", CheckStatus::Pass, "svg", start),
        Err(e) => CheckResult::new("QR renderer", CheckStatus::Fail, e.to_string(), start),
    }
}
