// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation-store port for persistence backends (SQLite, etc.).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ValetError;
use crate::traits::adapter::Adapter;
use crate::types::{MessageStatus, PersistedMessage, ScheduledTask};

/// Durable mapping from a conversation key to its message log, plus the
/// scheduled-task table. Consumed, not owned, by the core.
#[async_trait]
pub trait StorageAdapter: Adapter {
    /// Initializes the backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), ValetError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), ValetError>;

    // --- Message operations ---

    async fn append_message(&self, message: &PersistedMessage) -> Result<(), ValetError>;

    /// Returns the most recent `limit` `done` messages for the key, in
    /// chronological order. Unfinished and errored rows are excluded so
    /// restore never replays them.
    async fn load_recent_messages(
        &self,
        conversation_key: &str,
        limit: usize,
    ) -> Result<Vec<PersistedMessage>, ValetError>;

    async fn update_status(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), ValetError>;

    // --- Scheduled-task operations ---

    async fn create_task(&self, task: &ScheduledTask) -> Result<(), ValetError>;

    async fn load_active_tasks(&self) -> Result<Vec<ScheduledTask>, ValetError>;

    async fn get_task(&self, id: &str) -> Result<Option<ScheduledTask>, ValetError>;

    async fn set_task_active(&self, id: &str, active: bool) -> Result<(), ValetError>;

    async fn delete_task(&self, id: &str) -> Result<(), ValetError>;

    async fn update_task_last_run(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ValetError>;
}
