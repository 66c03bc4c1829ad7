// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outgoing delivery status with a monotonic compare-and-set.

use rusqlite::{params, OptionalExtension};
use wamux_core::{StatusLevel, StatusOutcome, WamuxError};

use crate::database::{map_tr_err, Database};

/// Raise the stored status of `message_id` to `level` if it is strictly higher.
///
/// The row is created at `pending` when absent. Insert, read and conditional
/// update run in one transaction on the writer thread, so concurrent callers
/// for the same id are serialized.
pub async fn advance_status(
    db: &Database,
    session_id: &str,
    remote_jid: &str,
    message_id: &str,
    level: StatusLevel,
) -> Result<StatusOutcome, WamuxError> {
    let (session_id, remote_jid, message_id) =
        (session_id.to_string(), remote_jid.to_string(), message_id.to_string());
    let target = level.ordinal();
    let pending = StatusLevel::Pending.ordinal();

    let (inserted, previous, updated) = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO outgoing_messages (message_id, session_id, remote_jid, status)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(message_id) DO NOTHING",
                params![message_id, session_id, remote_jid, pending],
            )? == 1;
            let previous: i64 = tx.query_row(
                "SELECT status FROM outgoing_messages WHERE message_id = ?1",
                params![message_id],
                |row| row.get(0),
            )?;
            let updated = tx.execute(
                "UPDATE outgoing_messages
                 SET status = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE message_id = ?1 AND status < ?2",
                params![message_id, target],
            )? == 1;
            tx.commit()?;
            Ok((inserted, previous, updated))
        })
        .await
        .map_err(map_tr_err)?;

    let stored = |ordinal: i64| {
        StatusLevel::from_ordinal(ordinal).ok_or_else(|| {
            WamuxError::Internal(format!("unknown status ordinal {ordinal} for message"))
        })
    };

    Ok(match (inserted, updated) {
        (true, true) => StatusOutcome::Advanced {
            previous: None,
            current: level,
        },
        (true, false) => StatusOutcome::Advanced {
            previous: None,
            current: stored(previous)?,
        },
        (false, true) => StatusOutcome::Advanced {
            previous: Some(stored(previous)?),
            current: level,
        },
        (false, false) => StatusOutcome::Discarded {
            current: stored(previous)?,
        },
    })
}

pub async fn get_status(db: &Database, message_id: &str) -> Result<Option<StatusLevel>, WamuxError> {
    let message_id = message_id.to_string();
    let ordinal: Option<i64> = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT status FROM outgoing_messages WHERE message_id = ?1",
                params![message_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;
    Ok(ordinal.and_then(StatusLevel::from_ordinal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;
    use proptest::prelude::*;

    const JID: &str = "15550001@s.whatsapp.net";

    #[tokio::test]
    async fn out_of_order_acks_keep_the_maximum() {
        let (db, _dir) = setup_db().await;

        let first = advance_status(&db, "s1", JID, "m1", StatusLevel::ServerAck)
            .await
            .unwrap();
        assert_eq!(
            first,
            StatusOutcome::Advanced {
                previous: None,
                current: StatusLevel::ServerAck
            }
        );

        let read = advance_status(&db, "s1", JID, "m1", StatusLevel::Read)
            .await
            .unwrap();
        assert_eq!(
            read,
            StatusOutcome::Advanced {
                previous: Some(StatusLevel::ServerAck),
                current: StatusLevel::Read
            }
        );

        let late = advance_status(&db, "s1", JID, "m1", StatusLevel::DeliveryAck)
            .await
            .unwrap();
        assert_eq!(
            late,
            StatusOutcome::Discarded {
                current: StatusLevel::Read
            }
        );
        assert_eq!(get_status(&db, "m1").await.unwrap(), Some(StatusLevel::Read));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn first_pending_creates_row() {
        let (db, _dir) = setup_db().await;
        let outcome = advance_status(&db, "s1", JID, "m1", StatusLevel::Pending)
            .await
            .unwrap();
        assert!(outcome.is_advanced());
        assert_eq!(outcome.current(), StatusLevel::Pending);

        let again = advance_status(&db, "s1", JID, "m1", StatusLevel::Pending)
            .await
            .unwrap();
        assert!(!again.is_advanced());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn error_after_pending_is_discarded() {
        let (db, _dir) = setup_db().await;
        advance_status(&db, "s1", JID, "m1", StatusLevel::Pending)
            .await
            .unwrap();
        let outcome = advance_status(&db, "s1", JID, "m1", StatusLevel::Error)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            StatusOutcome::Discarded {
                current: StatusLevel::Pending
            }
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn first_error_report_is_stored_as_pending() {
        let (db, _dir) = setup_db().await;
        let outcome = advance_status(&db, "s1", JID, "m1", StatusLevel::Error)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            StatusOutcome::Advanced {
                previous: None,
                current: StatusLevel::Pending
            }
        );
        assert_eq!(get_status(&db, "m1").await.unwrap(), Some(StatusLevel::Pending));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_message_has_no_status() {
        let (db, _dir) = setup_db().await;
        assert_eq!(get_status(&db, "nope").await.unwrap(), None);
        db.close().await.unwrap();
    }

    fn level_strategy() -> impl Strategy<Value = StatusLevel> {
        prop_oneof![
            Just(StatusLevel::Error),
            Just(StatusLevel::Pending),
            Just(StatusLevel::ServerAck),
            Just(StatusLevel::DeliveryAck),
            Just(StatusLevel::Read),
            Just(StatusLevel::Played),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn stored_status_is_maximum_seen(levels in proptest::collection::vec(level_strategy(), 1..12)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let final_level = rt.block_on(async {
                let (db, _dir) = setup_db().await;
                for level in &levels {
                    advance_status(&db, "s1", JID, "m1", *level).await.unwrap();
                }
                let status = get_status(&db, "m1").await.unwrap();
                db.close().await.unwrap();
                status
            });
            let max = levels.iter().map(|l| l.ordinal()).max().unwrap().max(StatusLevel::Pending.ordinal());
            prop_assert_eq!(final_level.map(|l| l.ordinal()), Some(max));
        }
    }
}
