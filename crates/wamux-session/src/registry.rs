// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrency-safe map from session id to live session handle.
//!
//! The registry is the single source of truth for "is this session live".
//! It is owned by the [`SessionManager`](crate::SessionManager) and shared
//! with each session's dispatcher; there is no global instance.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use wamux_core::WamuxError;

use crate::session::Session;

/// Live sessions by id.
pub type SessionRegistry = Registry<Session>;

/// Id-keyed map of shared handles. At most one handle per id.
pub struct Registry<T> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fails with `SessionExists` when `session_id` is already live.
    pub async fn register(&self, session_id: &str, handle: Arc<T>) -> Result<(), WamuxError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(session_id) {
            return Err(WamuxError::SessionExists {
                session_id: session_id.to_string(),
            });
        }
        entries.insert(session_id.to_string(), handle);
        Ok(())
    }

    /// Fails with `SessionNotFound` when `session_id` is not live.
    pub async fn lookup(&self, session_id: &str) -> Result<Arc<T>, WamuxError> {
        self.entries
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| WamuxError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.entries.read().await.contains_key(session_id)
    }

    /// Removes the entry only if it still points at `handle`.
    ///
    /// Returns `false` when the id is unknown or was re-registered with a
    /// newer handle, which a stale teardown must not evict.
    pub async fn deregister(&self, session_id: &str, handle: &Arc<T>) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(session_id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                entries.remove(session_id);
                true
            }
            _ => false,
        }
    }

    pub async fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries.read().await.values().cloned().collect()
    }

    /// Empties the registry and returns what it held.
    pub async fn drain(&self) -> Vec<Arc<T>> {
        self.entries.write().await.drain().map(|(_, v)| v).collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
