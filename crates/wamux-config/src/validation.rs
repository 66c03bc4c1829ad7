// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde attributes cannot express. All failures are
//! collected; validation does not stop at the first one.

use std::path::Path;

use crate::diagnostic::{suggest_key, ConfigError};
use crate::model::WamuxConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Most QR codes a pairing attempt may stream.
pub const MAX_QR_GENERATIONS: u64 = 50;

/// Longest reconnect delay accepted, one hour.
pub const MAX_RECONNECT_INTERVAL_MS: u64 = 3_600_000;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &WamuxConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.service.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::UnknownLogLevel {
            value: config.service.log_level.clone(),
            suggestion: suggest_key(&level, LOG_LEVELS),
            valid_levels: LOG_LEVELS.join(", "),
        });
    }

    let session = &config.session;
    check_range(
        &mut errors,
        "session.max_qr_generations",
        u64::from(session.max_qr_generations),
        1,
        Some(MAX_QR_GENERATIONS),
    );
    check_range(
        &mut errors,
        "session.reconnect_interval_ms",
        session.reconnect_interval_ms,
        0,
        Some(MAX_RECONNECT_INTERVAL_MS),
    );
    check_range(&mut errors, "session.qr_buffer", session.qr_buffer as u64, 1, None);
    check_range(&mut errors, "bus.capacity", config.bus.capacity as u64, 1, None);

    if let Some(err) = check_sessions_dir(&session.sessions_dir) {
        errors.push(err);
    }
    if let Some(err) = check_database_path(&config.storage.database_path, &session.sessions_dir) {
        errors.push(err);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_range(errors: &mut Vec<ConfigError>, key: &str, value: u64, min: u64, max: Option<u64>) {
    if value < min || max.is_some_and(|max| value > max) {
        errors.push(ConfigError::OutOfRange {
            key: key.to_string(),
            value,
            min,
            max,
        });
    }
}

/// The scoped-storage root must be a directory (or not exist yet).
fn check_sessions_dir(dir: &str) -> Option<ConfigError> {
    let unusable = |reason: &str, advice: &str| ConfigError::UnusablePath {
        key: "session.sessions_dir".to_string(),
        path: dir.to_string(),
        reason: reason.to_string(),
        advice: Some(advice.to_string()),
    };
    if dir.trim().is_empty() {
        return Some(unusable(
            "the path is empty",
            "point it at a directory wamux may create per-session folders in",
        ));
    }
    if Path::new(dir).is_file() {
        return Some(unusable(
            &format!("{dir} is a file"),
            "choose a directory; each session gets <sessions_dir>/<session_id>",
        ));
    }
    None
}

fn check_database_path(path: &str, sessions_dir: &str) -> Option<ConfigError> {
    let unusable = |reason: String, advice: &str| ConfigError::UnusablePath {
        key: "storage.database_path".to_string(),
        path: path.to_string(),
        reason,
        advice: Some(advice.to_string()),
    };
    if path.trim().is_empty() {
        return Some(unusable(
            "the path is empty".to_string(),
            "set it to the SQLite file wamux should use",
        ));
    }
    let db = Path::new(path);
    if db.is_dir() {
        return Some(unusable(
            format!("{path} is a directory"),
            "name the database file, e.g. wamux.db inside that directory",
        ));
    }
    // Deleting a session removes its whole folder under sessions_dir.
    let root = Path::new(sessions_dir);
    if !sessions_dir.trim().is_empty() && db.starts_with(root) && db != root {
        return Some(unusable(
            format!("{path} lies inside session.sessions_dir"),
            "keep the database outside the per-session folders",
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&WamuxConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_failure() {
        let mut config = WamuxConfig::default();
        config.service.log_level = "loud".into();
        config.session.max_qr_generations = 0;
        config.bus.capacity = 0;
        config.storage.database_path = "  ".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        let keys: Vec<_> = errors.iter().filter_map(ConfigError::key).collect();
        assert_eq!(
            keys,
            [
                "service.log_level",
                "session.max_qr_generations",
                "bus.capacity",
                "storage.database_path"
            ]
        );
    }

    #[test]
    fn zero_retries_is_allowed() {
        let mut config = WamuxConfig::default();
        config.session.max_retries = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn qr_budget_has_an_upper_bound() {
        let mut config = WamuxConfig::default();
        config.session.max_qr_generations = 51;
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            &errors[0],
            ConfigError::OutOfRange { value: 51, max: Some(50), .. }
        ));
    }

    #[test]
    fn log_level_typo_is_suggested() {
        let mut config = WamuxConfig::default();
        config.service.log_level = "debg".into();
        let errors = validate_config(&config).unwrap_err();
        match &errors[0] {
            ConfigError::UnknownLogLevel { suggestion, .. } => {
                assert_eq!(suggestion.as_deref(), Some("debug"));
            }
            other => panic!("expected UnknownLogLevel, got {other:?}"),
        }
    }

    #[test]
    fn paths_must_be_usable() {
        let dir = std::env::temp_dir();
        let mut config = WamuxConfig::default();
        config.storage.database_path = dir.to_string_lossy().into_owned();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            &errors[0],
            ConfigError::UnusablePath { key, .. } if key == "storage.database_path"
        ));

        let mut config = WamuxConfig::default();
        config.session.sessions_dir = "/srv/wamux/sessions".into();
        config.storage.database_path = "/srv/wamux/sessions/wamux.db".into();
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);
    }
}
