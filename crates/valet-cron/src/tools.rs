// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduling tools advertised to the model.
//!
//! The system preamble tells the model the current conversation key, which
//! `schedule_task` takes as an explicit argument to target the proactive
//! message.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use valet_core::{ScheduledTask, StorageAdapter, Tool, ValetError};

use crate::expr::CronExpr;

fn bad_args(e: serde_json::Error) -> ValetError {
    ValetError::Internal(format!("invalid tool arguments: {e}"))
}

/// Creates a recurring task from a description and cron expression.
pub struct ScheduleTaskTool {
    storage: Arc<dyn StorageAdapter>,
}

impl ScheduleTaskTool {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }
}

#[derive(Deserialize)]
struct ScheduleTaskArgs {
    conversation_key: String,
    description: String,
    cron: String,
}

#[async_trait]
impl Tool for ScheduleTaskTool {
    fn name(&self) -> &str {
        "schedule_task"
    }

    fn description(&self) -> &str {
        "Schedule a recurring task. At the times the cron expression matches, \
         you will be asked to compose and deliver a message for this task."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "conversation_key": {
                    "type": "string",
                    "description": "The current conversation key, from your instructions"
                },
                "description": {
                    "type": "string",
                    "description": "What the task should do, e.g. 'remind me to stretch'"
                },
                "cron": {
                    "type": "string",
                    "description": "5-field cron expression: minute hour day-of-month month day-of-week"
                }
            },
            "required": ["conversation_key", "description", "cron"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, ValetError> {
        let args: ScheduleTaskArgs = serde_json::from_value(args).map_err(bad_args)?;

        // Reject bad expressions here; a stored task that never fires is
        // invisible to the user.
        if let Err(e) = CronExpr::parse(&args.cron) {
            return Ok(format!("Cannot schedule: {e}. Use a 5-field cron expression."));
        }

        let task = ScheduledTask {
            id: Uuid::new_v4().to_string(),
            conversation_key: args.conversation_key,
            description: args.description,
            cron_expr: args.cron,
            active: true,
            last_run: None,
            created_at: Utc::now().to_rfc3339(),
        };
        self.storage.create_task(&task).await?;
        Ok(format!(
            "Scheduled task {} (\"{}\", cron: {}).",
            task.id, task.description, task.cron_expr
        ))
    }
}

/// Lists all active tasks.
pub struct ListTasksTool {
    storage: Arc<dyn StorageAdapter>,
}

impl ListTasksTool {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Tool for ListTasksTool {
    fn name(&self) -> &str {
        "list_tasks"
    }

    fn description(&self) -> &str {
        "List all active scheduled tasks with their ids and cron expressions."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: serde_json::Value) -> Result<String, ValetError> {
        let tasks = self.storage.load_active_tasks().await?;
        if tasks.is_empty() {
            return Ok("No scheduled tasks.".to_string());
        }
        let lines: Vec<String> = tasks
            .iter()
            .map(|t| {
                let last = t
                    .last_run
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                format!(
                    "{} - \"{}\" (cron: {}, last run: {})",
                    t.id, t.description, t.cron_expr, last
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

/// Deletes a scheduled task by id.
pub struct CancelTaskTool {
    storage: Arc<dyn StorageAdapter>,
}

impl CancelTaskTool {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }
}

#[derive(Deserialize)]
struct CancelTaskArgs {
    id: String,
}

#[async_trait]
impl Tool for CancelTaskTool {
    fn name(&self) -> &str {
        "cancel_task"
    }

    fn description(&self) -> &str {
        "Cancel a scheduled task by its id. Use list_tasks to find the id."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Id of the task to cancel"
                }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<String, ValetError> {
        let args: CancelTaskArgs = serde_json::from_value(args).map_err(bad_args)?;
        match self.storage.get_task(&args.id).await? {
            None => Ok(format!("No task with id {}.", args.id)),
            Some(task) => {
                self.storage.delete_task(&task.id).await?;
                Ok(format!("Cancelled task {} (\"{}\").", task.id, task.description))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valet_test_utils::MemStorage;

    #[tokio::test]
    async fn schedule_validates_cron_before_insert() {
        let storage = Arc::new(MemStorage::new());
        let tool = ScheduleTaskTool::new(storage.clone());

        let reply = tool
            .execute(serde_json::json!({
                "conversation_key": "alice",
                "description": "morning briefing",
                "cron": "not a cron"
            }))
            .await
            .unwrap();
        assert!(reply.contains("Cannot schedule"));
        assert!(storage.load_active_tasks().await.unwrap().is_empty());

        let reply = tool
            .execute(serde_json::json!({
                "conversation_key": "alice",
                "description": "morning briefing",
                "cron": "0 9 * * *"
            }))
            .await
            .unwrap();
        assert!(reply.contains("Scheduled task"));

        let tasks = storage.load_active_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].conversation_key, "alice");
        assert_eq!(tasks[0].cron_expr, "0 9 * * *");
        assert!(tasks[0].active);
        assert!(tasks[0].last_run.is_none());
    }

    #[tokio::test]
    async fn list_and_cancel_round_trip() {
        let storage = Arc::new(MemStorage::new());
        let schedule = ScheduleTaskTool::new(storage.clone());
        let list = ListTasksTool::new(storage.clone());
        let cancel = CancelTaskTool::new(storage.clone());

        assert_eq!(
            list.execute(serde_json::json!({})).await.unwrap(),
            "No scheduled tasks."
        );

        schedule
            .execute(serde_json::json!({
                "conversation_key": "alice",
                "description": "stretch",
                "cron": "*/15 * * * *"
            }))
            .await
            .unwrap();

        let listing = list.execute(serde_json::json!({})).await.unwrap();
        assert!(listing.contains("stretch"));
        assert!(listing.contains("last run: never"));

        let id = storage.load_active_tasks().await.unwrap()[0].id.clone();
        let reply = cancel
            .execute(serde_json::json!({ "id": id }))
            .await
            .unwrap();
        assert!(reply.contains("Cancelled"));
        assert!(storage.load_active_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_unknown_id_reports_cleanly() {
        let storage = Arc::new(MemStorage::new());
        let cancel = CancelTaskTool::new(storage);
        let reply = cancel
            .execute(serde_json::json!({ "id": "nope" }))
            .await
            .unwrap();
        assert!(reply.contains("No task"));
    }
}
