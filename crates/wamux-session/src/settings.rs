// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session budgets resolved from service defaults and persisted overrides.

use std::time::Duration;

use wamux_config::model::SessionConfig;
use wamux_core::SessionOptions;

/// Effective budgets of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Counted reconnects before the session is destroyed.
    pub max_retries: u32,
    /// Delay before a counted reconnect.
    pub reconnect_interval: Duration,
    /// Pairing payloads streamed before pairing is abandoned.
    pub max_qr_generations: u32,
    /// Capacity of the QR stream channel.
    pub qr_buffer: usize,
}

impl SessionSettings {
    /// Overrides in `options` win over the `[session]` defaults.
    pub fn resolve(defaults: &SessionConfig, options: &SessionOptions) -> Self {
        Self {
            max_retries: options.max_retries.unwrap_or(defaults.max_retries),
            reconnect_interval: options
                .reconnect_interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| defaults.reconnect_interval()),
            max_qr_generations: options
                .max_qr_generations
                .unwrap_or(defaults.max_qr_generations)
                .max(1),
            qr_buffer: defaults.qr_buffer.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_take_precedence() {
        let defaults = SessionConfig::default();
        let options = SessionOptions {
            max_retries: Some(1),
            reconnect_interval_ms: Some(10),
            max_qr_generations: None,
        };
        let settings = SessionSettings::resolve(&defaults, &options);
        assert_eq!(settings.max_retries, 1);
        assert_eq!(settings.reconnect_interval, Duration::from_millis(10));
        assert_eq!(settings.max_qr_generations, defaults.max_qr_generations);
    }

    #[test]
    fn zero_qr_budget_is_raised() {
        let options = SessionOptions {
            max_qr_generations: Some(0),
            ..Default::default()
        };
        let settings = SessionSettings::resolve(&SessionConfig::default(), &options);
        assert_eq!(settings.max_qr_generations, 1);
    }
}
