// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory storage adapter.
//!
//! Behaves like the SQLite backend for the operations the core uses,
//! including the restore rule that only replays `done` rows, without
//! touching the filesystem.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use valet_core::{
    Adapter, AdapterType, MessageStatus, PersistedMessage, ScheduledTask, StorageAdapter,
    ValetError,
};

#[derive(Default)]
struct Tables {
    messages: Vec<PersistedMessage>,
    tasks: Vec<ScheduledTask>,
}

/// Vec-backed storage port for tests.
pub struct MemStorage {
    tables: Mutex<Tables>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    /// All rows for a key regardless of status, insertion order.
    pub async fn all_messages(&self, conversation_key: &str) -> Vec<PersistedMessage> {
        self.tables
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.conversation_key == conversation_key)
            .cloned()
            .collect()
    }

    pub async fn message_count(&self) -> usize {
        self.tables.lock().await.messages.len()
    }
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MemStorage {
    fn name(&self) -> &str {
        "mem-storage"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn shutdown(&self) -> Result<(), ValetError> {
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for MemStorage {
    async fn initialize(&self) -> Result<(), ValetError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ValetError> {
        Ok(())
    }

    async fn append_message(&self, message: &PersistedMessage) -> Result<(), ValetError> {
        self.tables.lock().await.messages.push(message.clone());
        Ok(())
    }

    async fn load_recent_messages(
        &self,
        conversation_key: &str,
        limit: usize,
    ) -> Result<Vec<PersistedMessage>, ValetError> {
        let tables = self.tables.lock().await;
        let eligible: Vec<_> = tables
            .messages
            .iter()
            .filter(|m| {
                m.conversation_key == conversation_key && m.status == MessageStatus::Done
            })
            .cloned()
            .collect();
        let skip = eligible.len().saturating_sub(limit);
        Ok(eligible.into_iter().skip(skip).collect())
    }

    async fn update_status(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), ValetError> {
        let mut tables = self.tables.lock().await;
        for m in tables.messages.iter_mut() {
            if m.id == message_id {
                m.status = status;
                return Ok(());
            }
        }
        Ok(())
    }

    async fn create_task(&self, task: &ScheduledTask) -> Result<(), ValetError> {
        self.tables.lock().await.tasks.push(task.clone());
        Ok(())
    }

    async fn load_active_tasks(&self) -> Result<Vec<ScheduledTask>, ValetError> {
        Ok(self
            .tables
            .lock()
            .await
            .tasks
            .iter()
            .filter(|t| t.active)
            .cloned()
            .collect())
    }

    async fn get_task(&self, id: &str) -> Result<Option<ScheduledTask>, ValetError> {
        Ok(self
            .tables
            .lock()
            .await
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn set_task_active(&self, id: &str, active: bool) -> Result<(), ValetError> {
        let mut tables = self.tables.lock().await;
        for t in tables.tasks.iter_mut() {
            if t.id == id {
                t.active = active;
            }
        }
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<(), ValetError> {
        self.tables.lock().await.tasks.retain(|t| t.id != id);
        Ok(())
    }

    async fn update_task_last_run(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ValetError> {
        let mut tables = self.tables.lock().await;
        for t in tables.tasks.iter_mut() {
            if t.id == id {
                t.last_run = Some(at);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valet_core::Role;

    fn row(key: &str, content: &str, status: MessageStatus) -> PersistedMessage {
        PersistedMessage {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_key: key.to_string(),
            role: Role::User,
            content: content.to_string(),
            transport_message_id: None,
            sender_name: None,
            sender_id: None,
            status,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn load_recent_skips_unfinished_rows() {
        let storage = MemStorage::new();
        storage
            .append_message(&row("c1", "done", MessageStatus::Done))
            .await
            .unwrap();
        storage
            .append_message(&row("c1", "stuck", MessageStatus::Processing))
            .await
            .unwrap();
        storage
            .append_message(&row("c1", "queued", MessageStatus::Pending))
            .await
            .unwrap();
        storage
            .append_message(&row("c1", "failed", MessageStatus::Error))
            .await
            .unwrap();

        let rows = storage.load_recent_messages("c1", 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "done");
    }

    #[tokio::test]
    async fn load_recent_keeps_the_most_recent_rows() {
        let storage = MemStorage::new();
        for i in 0..5 {
            storage
                .append_message(&row("c1", &format!("m{i}"), MessageStatus::Done))
                .await
                .unwrap();
        }

        let rows = storage.load_recent_messages("c1", 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content, "m3");
        assert_eq!(rows[1].content, "m4");
    }
}
