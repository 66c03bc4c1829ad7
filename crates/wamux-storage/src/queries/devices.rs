// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device connectivity status.

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};
use wamux_core::records::now_rfc3339;
use wamux_core::{DeviceRecord, DeviceStatus, WamuxError};

use crate::database::{map_tr_err, Database};

/// Record `status`. `phone` only overwrites the stored value when `Some`.
pub async fn update_device_status(
    db: &Database,
    device_id: &str,
    status: DeviceStatus,
    phone: Option<&str>,
) -> Result<(), WamuxError> {
    let device_id = device_id.to_string();
    let status = status.to_string();
    let phone = phone.map(str::to_string);
    let now = now_rfc3339();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO devices (device_id, status, phone, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(device_id) DO UPDATE SET
                    status = excluded.status,
                    phone = COALESCE(excluded.phone, devices.phone),
                    updated_at = excluded.updated_at",
                params![device_id, status, phone, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_device(db: &Database, device_id: &str) -> Result<Option<DeviceRecord>, WamuxError> {
    let device_id = device_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT device_id, status, phone, updated_at FROM devices WHERE device_id = ?1",
                params![device_id],
                |row| {
                    let status: String = row.get(1)?;
                    let status = DeviceStatus::from_str(&status).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                    })?;
                    Ok(DeviceRecord {
                        device_id: row.get(0)?,
                        status,
                        phone: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
