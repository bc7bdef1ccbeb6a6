// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-message processing pipeline.
//!
//! One [`MessagePipeline::process`] call carries an inbound message from
//! persistence through completion to delivery, holding that conversation's
//! lock for the duration. Failures are classified and answered with a
//! short apology; they never cross into other conversations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use valet_core::{
    ChannelAdapter, InboundMessage, MemoryAdapter, MessageStatus, PersistedMessage,
    ProviderAdapter, Role, StorageAdapter, Turn, ValetError,
};

use crate::session::SessionManager;

const APOLOGY: &str = "Sorry, something went wrong while handling that message. Please try again.";

/// Immutable pipeline tuning, distilled from the loaded configuration at
/// wiring time.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Global default system prompt.
    pub system_prompt: String,
    /// Per-conversation preamble additions, keyed by conversation key.
    pub conversation_prompts: HashMap<String, String>,
    /// Feature-contributed prompt fragments (scheduling, memory, ...).
    pub prompt_fragments: Vec<String>,
    pub max_tokens: u32,
    /// Upper bound on one completion call.
    pub provider_timeout: Duration,
    pub memory_recall_limit: usize,
}

impl PipelineSettings {
    /// Builds settings from the loaded configuration. `system_prompt` is
    /// the already-resolved prompt text (inline or from file) and
    /// `prompt_fragments` come from the features wired into this process.
    pub fn from_config(
        config: &valet_config::ValetConfig,
        system_prompt: String,
        prompt_fragments: Vec<String>,
    ) -> Self {
        Self {
            system_prompt,
            conversation_prompts: config.agent.conversation_prompts.clone(),
            prompt_fragments,
            max_tokens: config.provider.max_tokens,
            provider_timeout: Duration::from_secs(config.provider.timeout_secs),
            memory_recall_limit: config.memory.recall_limit,
        }
    }
}

pub struct MessagePipeline {
    locks: DashMap<String, Arc<Mutex<()>>>,
    sessions: Arc<SessionManager>,
    storage: Arc<dyn StorageAdapter>,
    provider: Arc<dyn ProviderAdapter>,
    memory: Option<Arc<dyn MemoryAdapter>>,
    channel: Arc<dyn ChannelAdapter>,
    settings: PipelineSettings,
}

impl MessagePipeline {
    pub fn new(
        settings: PipelineSettings,
        sessions: Arc<SessionManager>,
        storage: Arc<dyn StorageAdapter>,
        provider: Arc<dyn ProviderAdapter>,
        memory: Option<Arc<dyn MemoryAdapter>>,
        channel: Arc<dyn ChannelAdapter>,
    ) -> Self {
        Self {
            locks: DashMap::new(),
            sessions,
            storage,
            provider,
            memory,
            channel,
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Processes one inbound message end to end. Never returns an error:
    /// failures are logged, answered with an apology, and absorbed here
    /// so the serializer worker keeps draining.
    pub async fn process(&self, inbound: InboundMessage) {
        let lock = self.conversation_lock(&inbound.conversation_key);
        let _guard = lock.lock().await;

        let inbound_row_id = Uuid::new_v4().to_string();
        if let Err(e) = self.process_locked(&inbound, &inbound_row_id).await {
            self.report_failure(&inbound, &inbound_row_id, &e).await;
        }
    }

    /// Returns the mutex guarding `conversation_key`, creating it on
    /// first use. Entries are created at most once per key.
    fn conversation_lock(&self, conversation_key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(conversation_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn process_locked(
        &self,
        inbound: &InboundMessage,
        inbound_row_id: &str,
    ) -> Result<(), ValetError> {
        let key = &inbound.conversation_key;
        let preamble = self.build_preamble(inbound);

        let session = self.sessions.get_or_restore(key, &preamble).await?;

        // Durable record first: the user's message outlives any failure
        // further down the pipeline.
        let inbound_row = PersistedMessage {
            id: inbound_row_id.to_string(),
            conversation_key: key.clone(),
            role: Role::User,
            content: inbound.text.clone(),
            transport_message_id: Some(inbound.transport_message_id.clone()),
            sender_name: Some(inbound.sender_name.clone()),
            sender_id: Some(inbound.sender_id.clone()),
            status: MessageStatus::Processing,
            created_at: Utc::now().to_rfc3339(),
        };
        self.storage.append_message(&inbound_row).await?;

        if let Err(e) = self.channel.send_typing(key).await {
            debug!(conversation_key = %key, error = %e, "typing indicator failed");
        }

        let recalled = self.recall_memory(key, &inbound.text).await;

        let user_content = if inbound.is_group {
            format!("{}: {}", inbound.sender_name, inbound.text)
        } else {
            inbound.text.clone()
        };

        let turns: Vec<Turn> = {
            let mut guard = session.lock().await;
            guard.set_preamble(preamble);
            if !recalled.is_empty() {
                guard.push_turn(Turn::new(
                    Role::System,
                    format!("Relevant context from memory:\n{}", recalled.join("\n")),
                ));
            }
            guard.push_turn(Turn::new(Role::User, user_content));
            guard.turns().to_vec()
        };

        let reply = tokio::time::timeout(
            self.settings.provider_timeout,
            self.provider.complete(&turns, self.settings.max_tokens),
        )
        .await
        .map_err(|_| ValetError::Timeout {
            duration: self.settings.provider_timeout,
        })??;

        {
            let mut guard = session.lock().await;
            guard.push_turn(Turn::new(Role::Assistant, reply.clone()));
        }

        let reply_row = PersistedMessage {
            id: Uuid::new_v4().to_string(),
            conversation_key: key.clone(),
            role: Role::Assistant,
            content: reply.clone(),
            transport_message_id: None,
            sender_name: None,
            sender_id: None,
            status: MessageStatus::Done,
            created_at: Utc::now().to_rfc3339(),
        };
        self.storage.append_message(&reply_row).await?;
        self.storage
            .update_status(&inbound_row.id, MessageStatus::Done)
            .await?;

        if let Some(memory) = &self.memory {
            if let Err(e) = memory.save(key, &inbound.text, &reply).await {
                warn!(conversation_key = %key, error = %e, "memory save failed");
            }
        }

        // Delivery failure is transport trouble, not a pipeline fault:
        // the turn is already durable, so log and move on.
        if let Err(e) = self
            .channel
            .send_text(key, &reply, Some(&inbound.transport_message_id))
            .await
        {
            warn!(conversation_key = %key, error = %e, "reply delivery failed");
        }

        info!(
            conversation_key = %key,
            reply_len = reply.len(),
            "message processed"
        );
        Ok(())
    }

    fn build_preamble(&self, inbound: &InboundMessage) -> String {
        let mut parts = vec![self.settings.system_prompt.clone()];

        if let Some(extra) = self
            .settings
            .conversation_prompts
            .get(&inbound.conversation_key)
        {
            parts.push(extra.clone());
        }

        parts.extend(self.settings.prompt_fragments.iter().cloned());

        if inbound.is_group {
            let title = inbound.group_title.as_deref().unwrap_or("unnamed");
            parts.push(format!(
                "You are in the group chat \"{title}\". User messages are \
                 prefixed with the sender's name. Only reply when you are \
                 directly addressed or can clearly help."
            ));
        }

        parts.push(format!(
            "Conversation key: {}",
            inbound.conversation_key
        ));

        parts.join("\n\n")
    }

    async fn recall_memory(&self, conversation_key: &str, query: &str) -> Vec<String> {
        let Some(memory) = &self.memory else {
            return Vec::new();
        };
        match memory
            .recall(conversation_key, query, self.settings.memory_recall_limit)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                // Recall is best-effort; a degraded memory store must not
                // block the reply.
                warn!(conversation_key, error = %e, "memory recall failed");
                Vec::new()
            }
        }
    }

    async fn report_failure(
        &self,
        inbound: &InboundMessage,
        inbound_row_id: &str,
        error: &ValetError,
    ) {
        let key = &inbound.conversation_key;
        match error {
            ValetError::Timeout { duration } => {
                error!(conversation_key = %key, ?duration, "completion timed out")
            }
            ValetError::Provider { message, .. } => {
                error!(conversation_key = %key, %message, "completion failed")
            }
            ValetError::Storage { source } => {
                error!(conversation_key = %key, error = %source, "storage failure in pipeline")
            }
            other => {
                error!(conversation_key = %key, error = %other, "pipeline failure")
            }
        }

        // Mark the inbound row as failed so it is never replayed on
        // restore. If the row was never written, this matches nothing; if
        // the write itself fails the row stays `processing`, which restore
        // also skips.
        if let Err(e) = self
            .storage
            .update_status(inbound_row_id, MessageStatus::Error)
            .await
        {
            warn!(conversation_key = %key, error = %e, "failed to mark message as errored");
        }

        if let Err(e) = self
            .channel
            .send_text(key, APOLOGY, Some(&inbound.transport_message_id))
            .await
        {
            warn!(conversation_key = %key, error = %e, "failed to deliver apology");
        }
    }
}
