// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations.

use rusqlite::params;
use valet_core::ValetError;
use valet_core::types::{MessageStatus, PersistedMessage, Role};

use crate::database::Database;

/// Insert a new message row.
pub async fn append_message(db: &Database, msg: &PersistedMessage) -> Result<(), ValetError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_key, role, content,
                     transport_message_id, sender_name, sender_id, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    msg.id,
                    msg.conversation_key,
                    msg.role.to_string(),
                    msg.content,
                    msg.transport_message_id,
                    msg.sender_name,
                    msg.sender_id,
                    msg.status.to_string(),
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The most recent `limit` settled messages for a conversation key, in
/// chronological order.
///
/// Only `done` rows qualify: `pending` and `processing` rows belong to
/// turns that never completed, and `error` rows to turns that failed;
/// neither must be replayed on restore.
pub async fn load_recent_messages(
    db: &Database,
    conversation_key: &str,
    limit: usize,
) -> Result<Vec<PersistedMessage>, ValetError> {
    let conversation_key = conversation_key.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_key, role, content, transport_message_id,
                        sender_name, sender_id, status, created_at
                 FROM messages
                 WHERE conversation_key = ?1
                   AND status = 'done'
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![conversation_key, limit as i64], message_from_row)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            // Newest-first from the query; callers want chronological order.
            messages.reverse();
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Update the status of one message row.
pub async fn update_status(
    db: &Database,
    message_id: &str,
    status: MessageStatus,
) -> Result<(), ValetError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET status = ?1 WHERE id = ?2",
                params![status.to_string(), message_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PersistedMessage> {
    let role: String = row.get(2)?;
    let status: String = row.get(7)?;
    Ok(PersistedMessage {
        id: row.get(0)?,
        conversation_key: row.get(1)?,
        role: role.parse::<Role>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        content: row.get(3)?,
        transport_message_id: row.get(4)?,
        sender_name: row.get(5)?,
        sender_id: row.get(6)?,
        status: status.parse::<MessageStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_msg(id: &str, role: Role, content: &str, timestamp: &str) -> PersistedMessage {
        PersistedMessage {
            id: id.to_string(),
            conversation_key: "tg:100".to_string(),
            role,
            content: content.to_string(),
            transport_message_id: None,
            sender_name: Some("Ada".to_string()),
            sender_id: Some("100".to_string()),
            status: MessageStatus::Done,
            created_at: timestamp.to_string(),
        }
    }

    #[tokio::test]
    async fn append_and_load_in_chronological_order() {
        let (db, _dir) = setup_db().await;

        let m1 = make_msg("m1", Role::User, "hello", "2026-01-01T00:00:01.000Z");
        let m2 = make_msg("m2", Role::Assistant, "hi there", "2026-01-01T00:00:02.000Z");
        let m3 = make_msg("m3", Role::User, "how are you?", "2026-01-01T00:00:03.000Z");

        append_message(&db, &m1).await.unwrap();
        append_message(&db, &m2).await.unwrap();
        append_message(&db, &m3).await.unwrap();

        let messages = load_recent_messages(&db, "tg:100", 10).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].id, "m1");
        assert_eq!(messages[1].id, "m2");
        assert_eq!(messages[2].id, "m3");
        assert_eq!(messages[1].role, Role::Assistant);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn load_returns_most_recent_when_limited() {
        let (db, _dir) = setup_db().await;

        for i in 0..5 {
            let msg = make_msg(
                &format!("m{i}"),
                Role::User,
                &format!("msg {i}"),
                &format!("2026-01-01T00:00:0{i}.000Z"),
            );
            append_message(&db, &msg).await.unwrap();
        }

        // The *newest* three, still in chronological order.
        let messages = load_recent_messages(&db, "tg:100", 3).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].id, "m2");
        assert_eq!(messages[2].id, "m4");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn load_excludes_unfinished_rows() {
        let (db, _dir) = setup_db().await;

        let mut stuck = make_msg("m1", Role::User, "lost turn", "2026-01-01T00:00:01.000Z");
        stuck.status = MessageStatus::Processing;
        append_message(&db, &stuck).await.unwrap();
        let mut failed = make_msg("m2", Role::User, "failed turn", "2026-01-01T00:00:02.000Z");
        failed.status = MessageStatus::Error;
        append_message(&db, &failed).await.unwrap();
        append_message(
            &db,
            &make_msg("m3", Role::User, "hello", "2026-01-01T00:00:03.000Z"),
        )
        .await
        .unwrap();

        let messages = load_recent_messages(&db, "tg:100", 10).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m3");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_status_flips_only_the_status() {
        let (db, _dir) = setup_db().await;

        let mut msg = make_msg("m1", Role::User, "hello", "2026-01-01T00:00:01.000Z");
        msg.status = MessageStatus::Processing;
        append_message(&db, &msg).await.unwrap();

        update_status(&db, "m1", MessageStatus::Done).await.unwrap();

        let messages = load_recent_messages(&db, "tg:100", 10).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, MessageStatus::Done);
        assert_eq!(messages[0].content, "hello");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn load_empty_conversation() {
        let (db, _dir) = setup_db().await;
        let messages = load_recent_messages(&db, "tg:unknown", 10).await.unwrap();
        assert!(messages.is_empty());
        db.close().await.unwrap();
    }
}
