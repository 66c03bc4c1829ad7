// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted protocol doubles.
//!
//! `MockConnector` hands out one event channel per connection attempt. Each
//! attempt replays the next scripted event list, and the channel stays open
//! afterwards so tests can keep pushing events with [`MockConnector::emit`].
//! All attempts share one [`MockClient`], which records what the session
//! layer asked of it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use wamux_core::protocol::{
    Credentials, GroupMetadata, MessageKey, OutgoingContent, ProtocolEvent,
};
use wamux_core::{Connection, ProtocolClient, ProtocolConnector, ProtocolErrorKind, WamuxError};

/// How one connection attempt behaves.
enum Attempt {
    Events(Vec<ProtocolEvent>),
    Fail(String),
}

/// Connector that replays scripted attempts.
pub struct MockConnector {
    client: Arc<MockClient>,
    attempts: Mutex<VecDeque<Attempt>>,
    credentials_seen: Mutex<Vec<Option<Credentials>>>,
    live: Mutex<Option<mpsc::Sender<ProtocolEvent>>>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::with_client(Arc::new(MockClient::new()))
    }

    pub fn with_client(client: Arc<MockClient>) -> Self {
        Self {
            client,
            attempts: Mutex::new(VecDeque::new()),
            credentials_seen: Mutex::new(Vec::new()),
            live: Mutex::new(None),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn client(&self) -> Arc<MockClient> {
        Arc::clone(&self.client)
    }

    /// Queues the events replayed by the next unscripted attempt.
    pub async fn script(&self, events: Vec<ProtocolEvent>) {
        self.attempts.lock().await.push_back(Attempt::Events(events));
    }

    /// Makes the next unscripted attempt fail before producing a client.
    pub async fn fail_next(&self, message: &str) {
        self.attempts
            .lock()
            .await
            .push_back(Attempt::Fail(message.to_string()));
    }

    /// Pushes one event on the most recent connection.
    ///
    /// Returns `false` when there is no connection or its receiver is gone.
    pub async fn emit(&self, event: ProtocolEvent) -> bool {
        let tx = self.live.lock().await.clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Drops the most recent connection's sender, which the session sees
    /// as a closed socket.
    pub async fn hang_up(&self) {
        self.live.lock().await.take();
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Credentials passed to each attempt, in order.
    pub async fn credentials_seen(&self) -> Vec<Option<Credentials>> {
        self.credentials_seen.lock().await.clone()
    }

    /// Waits until at least `count` attempts were made. `false` on timeout.
    pub async fn wait_for_connects(&self, count: usize, timeout: Duration) -> bool {
        let wait = async {
            while self.connect_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolConnector for MockConnector {
    async fn connect(
        &self,
        _session_id: &str,
        credentials: Option<Credentials>,
    ) -> Result<Connection, WamuxError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.credentials_seen.lock().await.push(credentials);

        let attempt = self.attempts.lock().await.pop_front();
        let events = match attempt {
            Some(Attempt::Fail(message)) => {
                return Err(WamuxError::protocol(ProtocolErrorKind::Other, message));
            }
            Some(Attempt::Events(events)) => events,
            None => Vec::new(),
        };

        let (tx, rx) = mpsc::channel(events.len().max(1) + 64);
        for event in events {
            // The buffer holds every scripted event.
            let _ = tx.try_send(event);
        }
        *self.live.lock().await = Some(tx);

        let client: Arc<dyn ProtocolClient> = self.client.clone();
        Ok(Connection { client, events: rx })
    }
}

/// Recording protocol client.
pub struct MockClient {
    sent: Mutex<Vec<(String, OutgoingContent)>>,
    groups: Mutex<HashMap<String, GroupMetadata>>,
    failing_groups: Mutex<HashSet<String>>,
    logout_error: Mutex<Option<ProtocolErrorKind>>,
    next_id: AtomicUsize,
    logouts: AtomicUsize,
    closes: AtomicUsize,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            groups: Mutex::new(HashMap::new()),
            failing_groups: Mutex::new(HashSet::new()),
            logout_error: Mutex::new(None),
            next_id: AtomicUsize::new(1),
            logouts: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    /// Makes the account a participant of `meta.id`.
    pub async fn add_group(&self, meta: GroupMetadata) {
        self.groups.lock().await.insert(meta.id.clone(), meta);
    }

    pub async fn remove_group(&self, group_id: &str) {
        self.groups.lock().await.remove(group_id);
    }

    /// Metadata queries for `group_id` fail even if the group is known.
    pub async fn fail_group(&self, group_id: &str) {
        self.failing_groups.lock().await.insert(group_id.to_string());
    }

    /// Makes `logout` fail with `kind`.
    pub async fn fail_logout_with(&self, kind: ProtocolErrorKind) {
        *self.logout_error.lock().await = Some(kind);
    }

    pub async fn sent_messages(&self) -> Vec<(String, OutgoingContent)> {
        self.sent.lock().await.clone()
    }

    pub fn logout_count(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolClient for MockClient {
    async fn send_message(
        &self,
        jid: &str,
        content: OutgoingContent,
    ) -> Result<MessageKey, WamuxError> {
        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sent.lock().await.push((jid.to_string(), content));
        Ok(MessageKey::new(jid, id, true))
    }

    async fn group_metadata(&self, group_id: &str) -> Result<GroupMetadata, WamuxError> {
        if self.failing_groups.lock().await.contains(group_id) {
            return Err(WamuxError::protocol(
                ProtocolErrorKind::Timeout,
                format!("metadata query for {group_id} timed out"),
            ));
        }
        self.groups
            .lock()
            .await
            .get(group_id)
            .cloned()
            .ok_or_else(|| {
                WamuxError::protocol(
                    ProtocolErrorKind::Rejected,
                    format!("not a participant of {group_id}"),
                )
            })
    }

    async fn group_fetch_all_participating(&self) -> Result<Vec<GroupMetadata>, WamuxError> {
        let mut groups: Vec<GroupMetadata> = self.groups.lock().await.values().cloned().collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(groups)
    }

    async fn logout(&self) -> Result<(), WamuxError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        match *self.logout_error.lock().await {
            Some(kind) => Err(WamuxError::protocol(kind, "logout failed")),
            None => Ok(()),
        }
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
