// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per persisted entity.

pub mod credentials;
pub mod devices;
pub mod groups;
pub mod messages;
pub mod outgoing;
pub mod sessions;
