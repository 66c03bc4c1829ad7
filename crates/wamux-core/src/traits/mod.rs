// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the session layer and its collaborators.
//!
//! All traits use `#[async_trait]` so they can be held as trait objects.

pub mod adapter;
pub mod credentials;
pub mod hooks;
pub mod protocol;
pub mod storage;

pub use adapter::PluginAdapter;
pub use credentials::CredentialStore;
pub use hooks::{InboundContext, InboundHook};
pub use protocol::{Connection, ProtocolClient, ProtocolConnector};
pub use storage::StorageAdapter;
