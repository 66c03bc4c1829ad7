// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw message persistence, receipts, reactions and soft deletion.

use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use wamux_core::protocol::{Reaction, Receipt};
use wamux_core::records::{merge_reaction as merge_reaction_list, merge_receipt as merge_receipt_list};
use wamux_core::{StoredMessage, WamuxError};

use crate::database::{map_tr_err, Database};

const SELECT_COLUMNS: &str = "session_id, remote_jid, message_id, from_me, participant, push_name,
     message_type, body, payload, timestamp, user_receipts, reactions, deleted";

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
    Ok(StoredMessage {
        session_id: row.get(0)?,
        remote_jid: row.get(1)?,
        message_id: row.get(2)?,
        from_me: row.get(3)?,
        participant: row.get(4)?,
        push_name: row.get(5)?,
        message_type: row.get(6)?,
        body: row.get(7)?,
        payload: row.get(8)?,
        timestamp: row.get(9)?,
        user_receipts: json_column(row, 10)?,
        reactions: json_column(row, 11)?,
        deleted: row.get(12)?,
    })
}

/// Upsert by `(session_id, remote_jid, message_id)`.
///
/// Content fields are last-write-wins. Receipts, reactions and the deleted
/// flag of an existing row are left untouched.
pub async fn upsert_message(db: &Database, msg: &StoredMessage) -> Result<(), WamuxError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            let receipts = to_json(&msg.user_receipts)?;
            let reactions = to_json(&msg.reactions)?;
            conn.execute(
                "INSERT INTO messages (session_id, remote_jid, message_id, from_me, participant,
                    push_name, message_type, body, payload, timestamp, user_receipts, reactions, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(session_id, remote_jid, message_id) DO UPDATE SET
                    from_me = excluded.from_me,
                    participant = COALESCE(excluded.participant, messages.participant),
                    push_name = COALESCE(excluded.push_name, messages.push_name),
                    message_type = COALESCE(excluded.message_type, messages.message_type),
                    body = COALESCE(excluded.body, messages.body),
                    payload = excluded.payload,
                    timestamp = COALESCE(excluded.timestamp, messages.timestamp),
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![
                    msg.session_id,
                    msg.remote_jid,
                    msg.message_id,
                    msg.from_me,
                    msg.participant,
                    msg.push_name,
                    msg.message_type,
                    msg.body,
                    msg.payload,
                    msg.timestamp,
                    receipts,
                    reactions,
                    msg.deleted,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_message(
    db: &Database,
    session_id: &str,
    remote_jid: &str,
    message_id: &str,
) -> Result<Option<StoredMessage>, WamuxError> {
    let (session_id, remote_jid, message_id) =
        (session_id.to_string(), remote_jid.to_string(), message_id.to_string());
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM messages
                 WHERE session_id = ?1 AND remote_jid = ?2 AND message_id = ?3"
            );
            conn.query_row(&sql, params![session_id, remote_jid, message_id], row_to_message)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Soft-delete the addressed `(remote_jid, message_id)` pairs. Idempotent.
pub async fn mark_messages_deleted(
    db: &Database,
    session_id: &str,
    keys: &[(String, String)],
) -> Result<usize, WamuxError> {
    let session_id = session_id.to_string();
    let keys = keys.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut touched = 0;
            {
                let mut stmt = tx.prepare(
                    "UPDATE messages SET deleted = 1,
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE session_id = ?1 AND remote_jid = ?2 AND message_id = ?3",
                )?;
                for (remote_jid, message_id) in &keys {
                    touched += stmt.execute(params![session_id, remote_jid, message_id])?;
                }
            }
            tx.commit()?;
            Ok(touched)
        })
        .await
        .map_err(map_tr_err)
}

/// Soft-delete every message of one chat.
pub async fn mark_chat_deleted(
    db: &Database,
    session_id: &str,
    remote_jid: &str,
) -> Result<usize, WamuxError> {
    let (session_id, remote_jid) = (session_id.to_string(), remote_jid.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET deleted = 1,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE session_id = ?1 AND remote_jid = ?2",
                params![session_id, remote_jid],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Read-modify-write of one JSON list column inside a transaction.
async fn update_json_list<T, F>(
    db: &Database,
    column: &'static str,
    key: (String, String, String),
    apply: F,
) -> Result<bool, WamuxError>
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + 'static,
    F: FnOnce(&mut Vec<T>) + Send + 'static,
{
    db.connection()
        .call(move |conn| {
            let (session_id, remote_jid, message_id) = key;
            let tx = conn.transaction()?;
            let select = format!(
                "SELECT {column} FROM messages
                 WHERE session_id = ?1 AND remote_jid = ?2 AND message_id = ?3"
            );
            let current: Option<Vec<T>> = tx
                .query_row(&select, params![session_id, remote_jid, message_id], |row| {
                    json_column(row, 0)
                })
                .optional()?;
            let Some(mut list) = current else {
                return Ok(false);
            };
            apply(&mut list);
            let update = format!(
                "UPDATE messages SET {column} = ?4,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE session_id = ?1 AND remote_jid = ?2 AND message_id = ?3"
            );
            tx.execute(
                &update,
                params![session_id, remote_jid, message_id, to_json(&list)?],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Merge a receipt, replacing any earlier one from the same `user_jid`.
pub async fn merge_receipt(
    db: &Database,
    session_id: &str,
    remote_jid: &str,
    message_id: &str,
    receipt: &Receipt,
) -> Result<bool, WamuxError> {
    let receipt = receipt.clone();
    update_json_list(
        db,
        "user_receipts",
        (session_id.to_string(), remote_jid.to_string(), message_id.to_string()),
        move |list: &mut Vec<Receipt>| merge_receipt_list(list, receipt),
    )
    .await
}

/// Merge a reaction; empty text removes the author's entry.
pub async fn merge_reaction(
    db: &Database,
    session_id: &str,
    remote_jid: &str,
    message_id: &str,
    reaction: &Reaction,
) -> Result<bool, WamuxError> {
    let reaction = reaction.clone();
    update_json_list(
        db,
        "reactions",
        (session_id.to_string(), remote_jid.to_string(), message_id.to_string()),
        move |list: &mut Vec<Reaction>| merge_reaction_list(list, reaction),
    )
    .await
}

/// Clear the session reference on every message of the session.
pub async fn detach_messages(db: &Database, session_id: &str) -> Result<usize, WamuxError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET session_id = NULL,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE session_id = ?1",
                params![session_id],
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    fn make_msg(id: &str, body: &str) -> StoredMessage {
        StoredMessage {
            session_id: Some("s1".into()),
            remote_jid: "15550001@s.whatsapp.net".into(),
            message_id: id.into(),
            from_me: false,
            participant: None,
            push_name: Some("Ana".into()),
            message_type: Some("conversation".into()),
            body: Some(body.into()),
            payload: "{}".into(),
            timestamp: Some(1_700_000_000),
            user_receipts: Vec::new(),
            reactions: Vec::new(),
            deleted: false,
        }
    }

    async fn fetch(db: &Database, id: &str) -> StoredMessage {
        get_message(db, "s1", "15550001@s.whatsapp.net", id)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn upsert_is_last_write_wins_but_keeps_merged_state() {
        let (db, _dir) = setup_db().await;
        upsert_message(&db, &make_msg("m1", "first")).await.unwrap();

        let receipt = Receipt {
            user_jid: "15550002@s.whatsapp.net".into(),
            receipt_timestamp: Some(5),
            read_timestamp: None,
            played_timestamp: None,
        };
        assert!(merge_receipt(&db, "s1", "15550001@s.whatsapp.net", "m1", &receipt)
            .await
            .unwrap());

        upsert_message(&db, &make_msg("m1", "edited")).await.unwrap();
        let stored = fetch(&db, "m1").await;
        assert_eq!(stored.body.as_deref(), Some("edited"));
        assert_eq!(stored.user_receipts, vec![receipt]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn receipts_merge_per_user() {
        let (db, _dir) = setup_db().await;
        upsert_message(&db, &make_msg("m1", "hi")).await.unwrap();
        let jid = "15550001@s.whatsapp.net";

        for (user, read) in [("a@s.whatsapp.net", None), ("b@s.whatsapp.net", None), ("a@s.whatsapp.net", Some(9))] {
            let receipt = Receipt {
                user_jid: user.into(),
                receipt_timestamp: Some(1),
                read_timestamp: read,
                played_timestamp: None,
            };
            merge_receipt(&db, "s1", jid, "m1", &receipt).await.unwrap();
        }

        let stored = fetch(&db, "m1").await;
        assert_eq!(stored.user_receipts.len(), 2);
        let a = stored
            .user_receipts
            .iter()
            .find(|r| r.user_jid == "a@s.whatsapp.net")
            .unwrap();
        assert_eq!(a.read_timestamp, Some(9));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reactions_replace_and_withdraw() {
        let (db, _dir) = setup_db().await;
        upsert_message(&db, &make_msg("m1", "hi")).await.unwrap();
        let jid = "15550001@s.whatsapp.net";
        let react = |text: &str| Reaction {
            author: "a@s.whatsapp.net".into(),
            text: text.into(),
            timestamp: None,
        };

        merge_reaction(&db, "s1", jid, "m1", &react("👍")).await.unwrap();
        merge_reaction(&db, "s1", jid, "m1", &react("🔥")).await.unwrap();
        let stored = fetch(&db, "m1").await;
        assert_eq!(stored.reactions.len(), 1);
        assert_eq!(stored.reactions[0].text, "🔥");

        merge_reaction(&db, "s1", jid, "m1", &react("")).await.unwrap();
        assert!(fetch(&db, "m1").await.reactions.is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn merge_on_unknown_message_reports_false() {
        let (db, _dir) = setup_db().await;
        let reaction = Reaction {
            author: "a".into(),
            text: "x".into(),
            timestamp: None,
        };
        assert!(!merge_reaction(&db, "s1", "nobody", "m404", &reaction)
            .await
            .unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn soft_delete_is_idempotent() {
        let (db, _dir) = setup_db().await;
        upsert_message(&db, &make_msg("m1", "a")).await.unwrap();
        upsert_message(&db, &make_msg("m2", "b")).await.unwrap();
        let jid = "15550001@s.whatsapp.net".to_string();

        let keys = vec![(jid.clone(), "m1".to_string()), (jid.clone(), "missing".to_string())];
        assert_eq!(mark_messages_deleted(&db, "s1", &keys).await.unwrap(), 1);
        assert_eq!(mark_messages_deleted(&db, "s1", &keys).await.unwrap(), 1);
        assert!(fetch(&db, "m1").await.deleted);
        assert!(!fetch(&db, "m2").await.deleted);

        assert_eq!(mark_chat_deleted(&db, "s1", &jid).await.unwrap(), 2);
        assert!(fetch(&db, "m2").await.deleted);

        // Re-delivery of a deleted message keeps the flag.
        upsert_message(&db, &make_msg("m2", "b")).await.unwrap();
        assert!(fetch(&db, "m2").await.deleted);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn detach_clears_session_reference() {
        let (db, _dir) = setup_db().await;
        upsert_message(&db, &make_msg("m1", "a")).await.unwrap();
        upsert_message(&db, &make_msg("m2", "b")).await.unwrap();

        assert_eq!(detach_messages(&db, "s1").await.unwrap(), 2);
        assert!(get_message(&db, "s1", "15550001@s.whatsapp.net", "m1")
            .await
            .unwrap()
            .is_none());

        let orphaned: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM messages WHERE session_id IS NULL",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(orphaned, 2);
        db.close().await.unwrap();
    }
}
