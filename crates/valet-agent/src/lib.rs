// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core runtime of the Valet assistant: the receive loop, per-key work
//! serializer, session manager, and message pipeline.
//!
//! The [`AgentLoop`] pulls inbound messages from the channel adapter and
//! routes each onto the [`KeyedSerializer`] under its conversation key, so
//! one conversation is always processed strictly in order while distinct
//! conversations overlap freely.

pub mod pipeline;
pub mod serializer;
pub mod session;
pub mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use valet_core::{ChannelAdapter, ValetError};

pub use pipeline::{MessagePipeline, PipelineSettings};
pub use serializer::KeyedSerializer;
pub use session::{ConversationSession, SessionManager, trim_history};

/// How long shutdown waits for queued conversations to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// The top-level receive loop connecting transport, serializer, and
/// pipeline.
pub struct AgentLoop {
    channel: Arc<dyn ChannelAdapter>,
    pipeline: Arc<MessagePipeline>,
    serializer: KeyedSerializer,
}

impl AgentLoop {
    pub fn new(
        channel: Arc<dyn ChannelAdapter>,
        pipeline: Arc<MessagePipeline>,
        serializer: KeyedSerializer,
    ) -> Self {
        Self {
            channel,
            pipeline,
            serializer,
        }
    }

    /// Runs until `cancel` fires, then drains in-flight conversations
    /// before returning. New messages are not accepted once cancellation
    /// is observed.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ValetError> {
        info!("agent loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.channel.receive() => {
                    match received {
                        Ok(msg) => {
                            debug!(
                                conversation_key = %msg.conversation_key,
                                "inbound message queued"
                            );
                            let pipeline = Arc::clone(&self.pipeline);
                            let key = msg.conversation_key.clone();
                            self.serializer.enqueue(&key, async move {
                                pipeline.process(msg).await;
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "channel receive failed, backing off");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }

        info!("agent loop stopping, draining queued work");
        if !self.serializer.drain(DRAIN_TIMEOUT).await {
            warn!("drain timeout expired, abandoning remaining work");
        }
        Ok(())
    }
}
