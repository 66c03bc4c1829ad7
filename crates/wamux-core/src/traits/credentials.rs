// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential store contract.

use async_trait::async_trait;

use crate::error::WamuxError;
use crate::protocol::Credentials;

/// Loads and saves per-session authentication material.
///
/// `save` is called on every credential rotation reported by the protocol
/// client, so implementations must tolerate frequent overwrites.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    async fn load(&self, session_id: &str) -> Result<Option<Credentials>, WamuxError>;

    async fn save(&self, session_id: &str, credentials: &Credentials) -> Result<(), WamuxError>;

    /// Forgets the session's credentials. Deleting a missing entry is not an error.
    async fn delete(&self, session_id: &str) -> Result<(), WamuxError>;
}
