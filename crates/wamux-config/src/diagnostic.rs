// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics rendered through miette.
//!
//! Parse failures from figment and semantic failures from
//! [`validate_config`](crate::validation::validate_config) end up as one
//! [`ConfigError`] each, so `wamux check` can print them all at once.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a key or value to be suggested.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// One problem found in the configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key that no section declares, e.g. `[session] max_retrys`.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(wamux::config::unknown_key),
        help("{}", did_you_mean(suggestion.as_deref(), "valid keys", valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys of the enclosing section.
        valid_keys: String,
        #[label("not a wamux setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value of the wrong TOML type, e.g. `capacity = "lots"`.
    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(wamux::config::invalid_type), help("`{key}` expects {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
    },

    /// `service.log_level` is not a tracing level.
    #[error("unknown log level `{value}`")]
    #[diagnostic(
        code(wamux::config::log_level),
        help("{}", did_you_mean(suggestion.as_deref(), "use one of", valid_levels))
    )]
    UnknownLogLevel {
        value: String,
        suggestion: Option<String>,
        valid_levels: String,
    },

    /// A session budget or buffer size outside the range a session can run with.
    #[error("`{key}` = {value} is out of range")]
    #[diagnostic(code(wamux::config::out_of_range), help("{}", range_help(key, *min, *max)))]
    OutOfRange {
        key: String,
        value: u64,
        min: u64,
        max: Option<u64>,
    },

    /// A filesystem location wamux cannot use.
    #[error("`{key}` cannot be used: {reason}")]
    #[diagnostic(code(wamux::config::path))]
    UnusablePath {
        key: String,
        path: String,
        reason: String,
        #[help]
        advice: Option<String>,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(wamux::config::other))]
    Other(String),
}

impl ConfigError {
    /// Dotted key the error is about, when there is one.
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::UnknownKey { key, .. }
            | ConfigError::InvalidType { key, .. }
            | ConfigError::OutOfRange { key, .. }
            | ConfigError::UnusablePath { key, .. } => Some(key),
            ConfigError::UnknownLogLevel { .. } => Some("service.log_level"),
            ConfigError::Other(_) => None,
        }
    }

    /// Splits a figment error (which may chain several) into diagnostics.
    ///
    /// `sources` pairs a file name with its TOML text and is used to point
    /// at the offending key.
    pub fn from_figment(err: figment::Error, sources: &[(String, String)]) -> Vec<ConfigError> {
        use figment::error::Kind;

        err.into_iter()
            .map(|error| match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let suggestion = suggest_key(field, expected);
                    let (span, src) = locate(&error, field, sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion,
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::InvalidType(found, expected) => ConfigError::InvalidType {
                    key: error.path.join("."),
                    found: found.to_string(),
                    expected: expected.to_string(),
                },
                _ => ConfigError::Other(error.to_string()),
            })
            .collect()
    }
}

fn did_you_mean(suggestion: Option<&str>, lead: &str, options: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {lead}: {options}"),
        None => format!("{lead}: {options}"),
    }
}

fn range_help(key: &str, min: u64, max: Option<u64>) -> String {
    match max {
        Some(max) => format!("set `{key}` between {min} and {max}"),
        None => format!("set `{key}` to at least {min}"),
    }
}

/// Source file and span of `field` for an unknown-key error.
fn locate(
    error: &figment::error::Error,
    field: &str,
    sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    // Inline sources carry no file path; use the only one given.
    let source = match origin {
        Some(path) => sources.iter().find(|(p, _)| *p == path),
        None if sources.len() == 1 => sources.first(),
        None => None,
    };
    let Some((name, content)) = source else {
        return (None, None);
    };

    match find_key_offset(content, &error.path, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` in TOML text, searched after the `[section]` header
/// named by the first element of `path`.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            break;
        }
        if let Some(rest) = trimmed.strip_prefix(field)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + line.len() - trimmed.len());
        }
        offset += line.len();
    }
    None
}

/// Closest candidate above the similarity threshold.
pub fn suggest_key<S: AsRef<str>>(unknown: &str, candidates: &[S]) -> Option<String> {
    candidates
        .iter()
        .map(|c| (strsim::jaro_winkler(unknown, c.as_ref()), c.as_ref()))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

/// Renders every diagnostic to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}
