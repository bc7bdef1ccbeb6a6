// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic-memory port for embedding-backed recall.

use async_trait::async_trait;

use crate::error::ValetError;
use crate::traits::adapter::Adapter;

/// Save/recall of conversational context by semantic similarity.
///
/// Both operations are best-effort: a failure here must never abort the
/// message pipeline. The pipeline carries this port as an
/// `Option<Arc<dyn MemoryAdapter>>` so absence is explicit and testable.
#[async_trait]
pub trait MemoryAdapter: Adapter {
    /// Returns up to `limit` stored texts relevant to `query`.
    async fn recall(
        &self,
        conversation_key: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, ValetError>;

    /// Stores one user/assistant exchange for later recall.
    async fn save(
        &self,
        conversation_key: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<(), ValetError>;
}
