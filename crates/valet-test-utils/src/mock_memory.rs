// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock semantic-memory adapter.

use async_trait::async_trait;
use tokio::sync::Mutex;
use valet_core::{Adapter, AdapterType, MemoryAdapter, ValetError};

/// A memory port returning fixed recall results and capturing saves.
pub struct MockMemory {
    recall_results: Mutex<Vec<String>>,
    saved: Mutex<Vec<(String, String, String)>>,
    fail_recall: bool,
}

impl MockMemory {
    pub fn new() -> Self {
        Self {
            recall_results: Mutex::new(Vec::new()),
            saved: Mutex::new(Vec::new()),
            fail_recall: false,
        }
    }

    pub fn with_recall(results: Vec<&str>) -> Self {
        let memory = Self::new();
        {
            let mut r = memory.recall_results.try_lock().unwrap();
            r.extend(results.into_iter().map(String::from));
        }
        memory
    }

    /// Every recall call fails; saves still succeed.
    pub fn failing_recall() -> Self {
        Self {
            fail_recall: true,
            ..Self::new()
        }
    }

    /// Captured `(conversation_key, user_text, assistant_text)` triples.
    pub async fn saved(&self) -> Vec<(String, String, String)> {
        self.saved.lock().await.clone()
    }
}

impl Default for MockMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MockMemory {
    fn name(&self) -> &str {
        "mock-memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Memory
    }

    async fn shutdown(&self) -> Result<(), ValetError> {
        Ok(())
    }
}

#[async_trait]
impl MemoryAdapter for MockMemory {
    async fn recall(
        &self,
        _conversation_key: &str,
        _query: &str,
        limit: usize,
    ) -> Result<Vec<String>, ValetError> {
        if self.fail_recall {
            return Err(ValetError::Memory("recall unavailable".into()));
        }
        let results = self.recall_results.lock().await;
        Ok(results.iter().take(limit).cloned().collect())
    }

    async fn save(
        &self,
        conversation_key: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<(), ValetError> {
        self.saved.lock().await.push((
            conversation_key.to_string(),
            user_text.to_string(),
            assistant_text.to_string(),
        ));
        Ok(())
    }
}
