// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the wamux configuration system.

use wamux_config::diagnostic::{suggest_key, ConfigError};
use wamux_config::model::WamuxConfig;
use wamux_config::{load_and_validate_str, load_config_from_str};

#[test]
fn valid_toml_deserializes_into_wamux_config() {
    let toml = r#"
[service]
name = "edge-1"
log_level = "debug"

[session]
max_retries = 3
reconnect_interval_ms = 250
max_qr_generations = 2
sessions_dir = "/var/lib/wamux/sessions"
qr_buffer = 4

[storage]
database_path = "/tmp/test.db"
wal_mode = false

[bus]
capacity = 64
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "edge-1");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.session.max_retries, 3);
    assert_eq!(config.session.reconnect_interval().as_millis(), 250);
    assert_eq!(config.session.max_qr_generations, 2);
    assert_eq!(config.session.sessions_dir, "/var/lib/wamux/sessions");
    assert_eq!(config.session.qr_buffer, 4);
    assert_eq!(config.storage.database_path, "/tmp/test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.bus.capacity, 64);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    let defaults = WamuxConfig::default();
    assert_eq!(config.service.name, "wamux");
    assert_eq!(config.session.max_retries, 5);
    assert_eq!(config.session.reconnect_interval_ms, 5_000);
    assert_eq!(config.session.max_qr_generations, 5);
    assert_eq!(config.bus.capacity, 1024);
    assert!(config.storage.wal_mode);
    assert_eq!(config.storage.database_path, defaults.storage.database_path);
}

#[test]
fn unknown_field_in_session_produces_error() {
    let toml = r#"
[session]
max_retrys = 3
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("max_retrys"),
        "error should mention the bad key, got: {err_str}"
    );
}

#[test]
fn unknown_key_diagnostic_carries_suggestion() {
    let toml = r#"
[session]
max_qr_generation = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            valid_keys,
            ..
        } => {
            assert_eq!(key, "max_qr_generation");
            assert_eq!(suggestion.as_deref(), Some("max_qr_generations"));
            assert!(valid_keys.contains("reconnect_interval_ms"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[telegram]
bot_token = "x"
"#;
    assert!(load_and_validate_str(toml).is_err());
}

#[test]
fn wrong_type_produces_invalid_type() {
    let toml = r#"
[bus]
capacity = "lots"
"#;

    let errors = load_and_validate_str(toml).expect_err("string is not a usize");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. })),
        "got {errors:?}"
    );
}

#[test]
fn semantic_validation_runs_after_parse() {
    let toml = r#"
[session]
max_qr_generations = 0

[bus]
capacity = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("zero budgets are invalid");
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::OutOfRange { min: 1, .. })));
}

#[test]
fn suggest_key_matches_storage_fields() {
    let valid = &["database_path", "wal_mode"];
    assert_eq!(
        suggest_key("databse_path", valid.as_slice()),
        Some("database_path".to_string())
    );
}
