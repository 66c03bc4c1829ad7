// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session configuration rows.

use rusqlite::params;
use wamux_core::{SessionConfigRow, WamuxError};

use crate::database::{map_tr_err, Database};

/// Insert or replace the configuration row for a session.
pub async fn save_session_config(db: &Database, row: &SessionConfigRow) -> Result<(), WamuxError> {
    let row = row.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO session_configs (session_id, device_id, options, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(session_id) DO UPDATE SET
                    device_id = excluded.device_id,
                    options = excluded.options",
                params![row.session_id, row.device_id, row.options, row.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All configuration rows, oldest first so restores follow creation order.
pub async fn list_session_configs(db: &Database) -> Result<Vec<SessionConfigRow>, WamuxError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, device_id, options, created_at
                 FROM session_configs ORDER BY created_at ASC, session_id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(SessionConfigRow {
                    session_id: row.get(0)?,
                    device_id: row.get(1)?,
                    options: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?;
            let sessions = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_session_config(db: &Database, session_id: &str) -> Result<(), WamuxError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM session_configs WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
