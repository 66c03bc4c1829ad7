// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-device group membership cache.

use rusqlite::{params, Row};
use wamux_core::{GroupRecord, WamuxError};

use crate::database::{map_tr_err, Database};

const UPSERT_SQL: &str = "INSERT INTO groups (group_id, device_id, group_name, participants_count, is_active)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT(group_id, device_id) DO UPDATE SET
        group_name = excluded.group_name,
        participants_count = excluded.participants_count,
        is_active = excluded.is_active,
        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

fn row_to_group(row: &Row<'_>) -> rusqlite::Result<GroupRecord> {
    Ok(GroupRecord {
        group_id: row.get(0)?,
        device_id: row.get(1)?,
        group_name: row.get(2)?,
        participants_count: row.get(3)?,
        is_active: row.get(4)?,
    })
}

/// Full resync: every row of the device goes inactive, then `groups` are
/// upserted as active. Runs in one transaction.
pub async fn replace_groups(
    db: &Database,
    device_id: &str,
    groups: &[GroupRecord],
) -> Result<(), WamuxError> {
    let device_id = device_id.to_string();
    let groups = groups.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE groups SET is_active = 0,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE device_id = ?1",
                params![device_id],
            )?;
            {
                let mut stmt = tx.prepare(UPSERT_SQL)?;
                for group in &groups {
                    stmt.execute(params![
                        group.group_id,
                        device_id,
                        group.group_name,
                        group.participants_count,
                        true,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn upsert_group(db: &Database, group: &GroupRecord) -> Result<(), WamuxError> {
    let group = group.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                UPSERT_SQL,
                params![
                    group.group_id,
                    group.device_id,
                    group.group_name,
                    group.participants_count,
                    group.is_active,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Refresh name and participant count of a cached row. The active flag is
/// not touched and unknown groups are not inserted.
pub async fn refresh_group(
    db: &Database,
    device_id: &str,
    group_id: &str,
    group_name: &str,
    participants_count: i64,
) -> Result<bool, WamuxError> {
    let (device_id, group_id, group_name) =
        (device_id.to_string(), group_id.to_string(), group_name.to_string());
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE groups SET group_name = ?3, participants_count = ?4,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE device_id = ?1 AND group_id = ?2",
                params![device_id, group_id, group_name, participants_count],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed > 0)
}

/// Flip one row's active flag. Returns `false` when the row does not exist.
pub async fn set_group_active(
    db: &Database,
    device_id: &str,
    group_id: &str,
    active: bool,
) -> Result<bool, WamuxError> {
    let (device_id, group_id) = (device_id.to_string(), group_id.to_string());
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE groups SET is_active = ?3,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE device_id = ?1 AND group_id = ?2",
                params![device_id, group_id, active],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed > 0)
}

pub async fn list_groups(
    db: &Database,
    device_id: &str,
    active_only: bool,
) -> Result<Vec<GroupRecord>, WamuxError> {
    let device_id = device_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT group_id, device_id, group_name, participants_count, is_active
                 FROM groups
                 WHERE device_id = ?1 AND (?2 = 0 OR is_active = 1)
                 ORDER BY group_id",
            )?;
            let rows = stmt.query_map(params![device_id, active_only], row_to_group)?;
            let groups = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(groups)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    fn group(id: &str, device: &str) -> GroupRecord {
        GroupRecord {
            group_id: id.to_string(),
            device_id: device.to_string(),
            group_name: format!("name {id}"),
            participants_count: 3,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn replace_with_empty_snapshot_deactivates_everything() {
        let (db, _dir) = setup_db().await;
        replace_groups(&db, "d1", &[group("g1", "d1"), group("g2", "d1")])
            .await
            .unwrap();
        assert_eq!(list_groups(&db, "d1", true).await.unwrap().len(), 2);

        replace_groups(&db, "d1", &[]).await.unwrap();
        assert!(list_groups(&db, "d1", true).await.unwrap().is_empty());
        assert_eq!(list_groups(&db, "d1", false).await.unwrap().len(), 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn replace_keeps_exactly_the_snapshot_active() {
        let (db, _dir) = setup_db().await;
        replace_groups(&db, "d1", &[group("g1", "d1"), group("g2", "d1")])
            .await
            .unwrap();
        replace_groups(&db, "d2", &[group("g9", "d2")]).await.unwrap();

        replace_groups(&db, "d1", &[group("g2", "d1"), group("g3", "d1")])
            .await
            .unwrap();

        let active: Vec<String> = list_groups(&db, "d1", true)
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.group_id)
            .collect();
        assert_eq!(active, vec!["g2", "g3"]);
        // Other devices are untouched.
        assert_eq!(list_groups(&db, "d2", true).await.unwrap().len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn incremental_flip_and_upsert() {
        let (db, _dir) = setup_db().await;
        upsert_group(&db, &group("g1", "d1")).await.unwrap();
        assert!(set_group_active(&db, "d1", "g1", false).await.unwrap());
        assert!(!set_group_active(&db, "d1", "missing", false).await.unwrap());

        let all = list_groups(&db, "d1", false).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active);

        let mut renamed = group("g1", "d1");
        renamed.group_name = "Renamed".into();
        renamed.participants_count = 7;
        upsert_group(&db, &renamed).await.unwrap();
        let active = list_groups(&db, "d1", true).await.unwrap();
        assert_eq!(active[0].group_name, "Renamed");
        assert_eq!(active[0].participants_count, 7);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn refresh_keeps_the_active_flag() {
        let (db, _dir) = setup_db().await;
        upsert_group(&db, &group("g1", "d1")).await.unwrap();
        set_group_active(&db, "d1", "g1", false).await.unwrap();

        assert!(refresh_group(&db, "d1", "g1", "Renamed", 9).await.unwrap());
        let all = list_groups(&db, "d1", false).await.unwrap();
        assert_eq!(all[0].group_name, "Renamed");
        assert_eq!(all[0].participants_count, 9);
        assert!(!all[0].is_active);

        assert!(!refresh_group(&db, "d1", "g2", "New", 1).await.unwrap());
        assert_eq!(list_groups(&db, "d1", false).await.unwrap().len(), 1);
        db.close().await.unwrap();
    }
}
