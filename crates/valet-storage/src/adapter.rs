// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use valet_config::model::StorageConfig;
use valet_core::types::{MessageStatus, PersistedMessage, ScheduledTask};
use valet_core::{Adapter, AdapterType, StorageAdapter, ValetError};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, ValetError> {
        self.db.get().ok_or_else(|| ValetError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl Adapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn shutdown(&self) -> Result<(), ValetError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ValetError> {
        let path = self.config.database_path.clone();
        let db = Database::open(&path).await?;
        self.db.set(db).map_err(|_| ValetError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ValetError> {
        self.db()?.close().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Message operations ---

    async fn append_message(&self, message: &PersistedMessage) -> Result<(), ValetError> {
        queries::messages::append_message(self.db()?, message).await
    }

    async fn load_recent_messages(
        &self,
        conversation_key: &str,
        limit: usize,
    ) -> Result<Vec<PersistedMessage>, ValetError> {
        queries::messages::load_recent_messages(self.db()?, conversation_key, limit).await
    }

    async fn update_status(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), ValetError> {
        queries::messages::update_status(self.db()?, message_id, status).await
    }

    // --- Scheduled-task operations ---

    async fn create_task(&self, task: &ScheduledTask) -> Result<(), ValetError> {
        queries::tasks::create_task(self.db()?, task).await
    }

    async fn load_active_tasks(&self) -> Result<Vec<ScheduledTask>, ValetError> {
        queries::tasks::load_active_tasks(self.db()?).await
    }

    async fn get_task(&self, id: &str) -> Result<Option<ScheduledTask>, ValetError> {
        queries::tasks::get_task(self.db()?, id).await
    }

    async fn set_task_active(&self, id: &str, active: bool) -> Result<(), ValetError> {
        queries::tasks::set_task_active(self.db()?, id, active).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), ValetError> {
        queries::tasks::delete_task(self.db()?, id).await
    }

    async fn update_task_last_run(&self, id: &str, at: DateTime<Utc>) -> Result<(), ValetError> {
        queries::tasks::update_task_last_run(self.db()?, id, at).await
    }
}
