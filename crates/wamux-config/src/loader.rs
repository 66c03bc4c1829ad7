// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./wamux.toml` > `~/.config/wamux/wamux.toml` > `/etc/wamux/wamux.toml`
//! with environment variable overrides via `WAMUX_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::WamuxConfig;

/// Top-level sections, used to turn `WAMUX_<SECTION>_<KEY>` into `section.key`.
const SECTIONS: &[&str] = &["service", "session", "storage", "bus"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/wamux/wamux.toml` (system-wide)
/// 3. `~/.config/wamux/wamux.toml` (user XDG config)
/// 4. `./wamux.toml` (local directory)
/// 5. `WAMUX_*` environment variables
pub fn load_config() -> Result<WamuxConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<WamuxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WamuxConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WamuxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WamuxConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(WamuxConfig::default()))
        .merge(Toml::file("/etc/wamux/wamux.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("wamux/wamux.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("wamux.toml"))
        .merge(env_provider())
}

/// Maps `session_max_retries` to `session.max_retries`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys like `sessions_dir` keep their underscores. Unknown prefixes pass
/// through unchanged and surface as unknown-key diagnostics.
pub fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}

fn env_provider() -> Env {
    Env::prefixed("WAMUX_").map(|key| map_env_key(key.as_str()).into())
}
