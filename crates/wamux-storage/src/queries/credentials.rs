// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session authentication material, stored as an opaque JSON document.

use rusqlite::{params, OptionalExtension};
use wamux_core::protocol::Credentials;
use wamux_core::WamuxError;

use crate::database::{map_tr_err, Database};

pub async fn load_credentials(
    db: &Database,
    session_id: &str,
) -> Result<Option<Credentials>, WamuxError> {
    let session_id = session_id.to_string();
    let raw: Option<String> = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT creds FROM credentials WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;
    raw.map(|text| serde_json::from_str(&text).map_err(WamuxError::from))
        .transpose()
}

/// Overwrites the stored document. Called on every rotation.
pub async fn save_credentials(
    db: &Database,
    session_id: &str,
    credentials: &Credentials,
) -> Result<(), WamuxError> {
    let session_id = session_id.to_string();
    let creds = serde_json::to_string(credentials)?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO credentials (session_id, creds) VALUES (?1, ?2)
                 ON CONFLICT(session_id) DO UPDATE SET
                    creds = excluded.creds,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![session_id, creds],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_credentials(db: &Database, session_id: &str) -> Result<(), WamuxError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM credentials WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
