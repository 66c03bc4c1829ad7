// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for wamux integration tests.
//!
//! Provides scripted protocol doubles, an in-memory store and a harness that
//! wires them into a [`SessionManager`](wamux_session::SessionManager), so
//! session behavior can be tested without a network.
//!
//! # Components
//!
//! - [`MockConnector`] / [`MockClient`] - scripted connection attempts and a recording client
//! - [`MemoryStorage`] - in-memory storage and credential store
//! - [`RecordingHook`] - inbound hook that records, fails or panics on demand
//! - [`TestHarness`] - manager plus mocks over a temp directory

pub mod events;
pub mod harness;
pub mod memory_storage;
pub mod mock_hook;
pub mod mock_protocol;

pub use harness::TestHarness;
pub use memory_storage::{MemoryStorage, StatusHold};
pub use mock_hook::{HookBehavior, RecordingHook};
pub use mock_protocol::{MockClient, MockConnector};
