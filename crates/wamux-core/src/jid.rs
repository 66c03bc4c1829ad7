// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for WhatsApp identifiers (JIDs).
//!
//! The network addresses users as `<number>[:<device>]@s.whatsapp.net`,
//! groups as `<id>@g.us`, and internal broadcast lists as `<id>@broadcast`.

/// Server suffix for individual users.
pub const USER_SERVER: &str = "s.whatsapp.net";
/// Server suffix for groups.
pub const GROUP_SERVER: &str = "g.us";
/// Status updates feed, never persisted.
pub const STATUS_BROADCAST: &str = "status@broadcast";

/// Returns the canonical form of a JID.
///
/// Drops the device suffix, maps the legacy `c.us` server to
/// `s.whatsapp.net`, lower-cases the server and turns bare phone numbers into
/// user JIDs.
pub fn normalize_jid(jid: &str) -> String {
    let jid = jid.trim();
    let Some((user, server)) = jid.split_once('@') else {
        let digits = jid.trim_start_matches('+');
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return format!("{digits}@{USER_SERVER}");
        }
        return jid.to_string();
    };

    let server = server.to_ascii_lowercase();
    let server = if server == "c.us" {
        USER_SERVER.to_string()
    } else {
        server
    };

    if server == GROUP_SERVER {
        return format!("{user}@{server}");
    }

    // `123:4` carries a device index, `123_1` an agent index.
    let user = user
        .split_once(':')
        .map(|(u, _)| u)
        .unwrap_or(user);
    let user = user.split_once('_').map(|(u, _)| u).unwrap_or(user);

    format!("{user}@{server}")
}

/// Group chats live on the `g.us` server.
pub fn is_group_jid(jid: &str) -> bool {
    jid.trim().to_ascii_lowercase().ends_with("@g.us")
}

/// Broadcast lists, the status feed and newsletters are network-internal.
pub fn is_broadcast_jid(jid: &str) -> bool {
    let jid = jid.trim().to_ascii_lowercase();
    jid.ends_with("@broadcast") || jid.ends_with("@newsletter")
}

/// Compares two JIDs after normalization.
pub fn same_user(a: &str, b: &str) -> bool {
    normalize_jid(a) == normalize_jid(b)
}
