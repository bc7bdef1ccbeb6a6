// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled-task CRUD operations.

use chrono::{DateTime, Utc};
use rusqlite::params;
use valet_core::ValetError;
use valet_core::types::ScheduledTask;

use crate::database::Database;

/// Insert a new scheduled task.
pub async fn create_task(db: &Database, task: &ScheduledTask) -> Result<(), ValetError> {
    let task = task.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, conversation_key, description, cron_expr,
                     active, last_run, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    task.id,
                    task.conversation_key,
                    task.description,
                    task.cron_expr,
                    task.active as i64,
                    task.last_run.map(|t| t.to_rfc3339()),
                    task.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All tasks with `active = true`, oldest first.
pub async fn load_active_tasks(db: &Database) -> Result<Vec<ScheduledTask>, ValetError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_key, description, cron_expr, active, last_run, created_at
                 FROM tasks WHERE active = 1 ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map([], task_from_row)?;
            let mut tasks = Vec::new();
            for row in rows {
                tasks.push(row?);
            }
            Ok(tasks)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Look up one task by id.
pub async fn get_task(db: &Database, id: &str) -> Result<Option<ScheduledTask>, ValetError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_key, description, cron_expr, active, last_run, created_at
                 FROM tasks WHERE id = ?1",
            )?;
            let mut rows = stmt.query_map(params![id], task_from_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Pause or resume a task.
pub async fn set_task_active(db: &Database, id: &str, active: bool) -> Result<(), ValetError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE tasks SET active = ?1 WHERE id = ?2",
                params![active as i64, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a task (cancellation).
pub async fn delete_task(db: &Database, id: &str) -> Result<(), ValetError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the instant a task last fired.
pub async fn update_task_last_run(
    db: &Database,
    id: &str,
    at: DateTime<Utc>,
) -> Result<(), ValetError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE tasks SET last_run = ?1 WHERE id = ?2",
                params![at.to_rfc3339(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduledTask> {
    let active: i64 = row.get(4)?;
    let last_run: Option<String> = row.get(5)?;
    let last_run = match last_run {
        Some(ref s) => Some(
            DateTime::parse_from_rfc3339(s)
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?
                .with_timezone(&Utc),
        ),
        None => None,
    };
    Ok(ScheduledTask {
        id: row.get(0)?,
        conversation_key: row.get(1)?,
        description: row.get(2)?,
        cron_expr: row.get(3)?,
        active: active != 0,
        last_run,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("tasks.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_task(id: &str, cron: &str) -> ScheduledTask {
        ScheduledTask {
            id: id.to_string(),
            conversation_key: "tg:100".to_string(),
            description: "morning briefing".to_string(),
            cron_expr: cron.to_string(),
            active: true,
            last_run: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_load_active_tasks() {
        let (db, _dir) = setup_db().await;

        create_task(&db, &make_task("t1", "0 9 * * *")).await.unwrap();
        create_task(&db, &make_task("t2", "*/15 * * * *")).await.unwrap();

        let tasks = load_active_tasks(&db).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].cron_expr, "0 9 * * *");
        assert!(tasks[0].last_run.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn paused_tasks_are_not_loaded() {
        let (db, _dir) = setup_db().await;

        create_task(&db, &make_task("t1", "0 9 * * *")).await.unwrap();
        set_task_active(&db, "t1", false).await.unwrap();

        assert!(load_active_tasks(&db).await.unwrap().is_empty());

        // Still visible through direct lookup.
        let task = get_task(&db, "t1").await.unwrap().unwrap();
        assert!(!task.active);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn last_run_round_trips() {
        let (db, _dir) = setup_db().await;

        create_task(&db, &make_task("t1", "0 9 * * *")).await.unwrap();
        let at = Utc::now();
        update_task_last_run(&db, "t1", at).await.unwrap();

        let task = get_task(&db, "t1").await.unwrap().unwrap();
        let stored = task.last_run.unwrap();
        assert!((stored - at).num_milliseconds().abs() < 10);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_the_task() {
        let (db, _dir) = setup_db().await;

        create_task(&db, &make_task("t1", "0 9 * * *")).await.unwrap();
        delete_task(&db, "t1").await.unwrap();

        assert!(get_task(&db, "t1").await.unwrap().is_none());

        db.close().await.unwrap();
    }
}
