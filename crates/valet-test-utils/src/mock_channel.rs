// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` with injectable inbound
//! messages and captured outbound sends for assertion in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use valet_core::{Adapter, AdapterType, ChannelAdapter, InboundMessage, ValetError};

/// One captured `send_text` call.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub conversation_key: String,
    pub text: String,
    pub reply_to: Option<String>,
}

/// A mock messaging channel for testing.
///
/// Messages injected via [`inject`](Self::inject) are returned by
/// `receive()` in order; everything passed to `send_text()` is captured
/// for later assertion.
pub struct MockChannel {
    inbound: Mutex<VecDeque<InboundMessage>>,
    sent: Mutex<Vec<SentMessage>>,
    typing_count: AtomicUsize,
    notify: Notify,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            inbound: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            typing_count: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    /// Queues an inbound message for the next `receive()` call.
    pub async fn inject(&self, msg: InboundMessage) {
        self.inbound.lock().await.push_back(msg);
        self.notify.notify_one();
    }

    /// Convenience constructor for a DM inbound message.
    pub fn dm(conversation_key: &str, sender: &str, text: &str) -> InboundMessage {
        InboundMessage {
            conversation_key: conversation_key.to_string(),
            transport_message_id: uuid::Uuid::new_v4().to_string(),
            sender_name: sender.to_string(),
            sender_id: format!("id-{sender}"),
            text: text.to_string(),
            is_group: false,
            group_title: None,
            received_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// All captured `send_text` calls, in order.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub fn typing_count(&self) -> usize {
        self.typing_count.load(Ordering::SeqCst)
    }

    /// Waits until at least `n` messages have been sent, or panics after
    /// five seconds.
    pub async fn wait_for_sent(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            if self.sent.lock().await.len() >= n {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for {n} sent messages");
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn shutdown(&self) -> Result<(), ValetError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    async fn connect(&mut self) -> Result<(), ValetError> {
        Ok(())
    }

    async fn receive(&self) -> Result<InboundMessage, ValetError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(msg) = queue.pop_front() {
                    return Ok(msg);
                }
            }
            self.notify.notified().await;
        }
    }

    async fn send_text(
        &self,
        conversation_key: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<(), ValetError> {
        self.sent.lock().await.push(SentMessage {
            conversation_key: conversation_key.to_string(),
            text: text.to_string(),
            reply_to: reply_to.map(|s| s.to_string()),
        });
        Ok(())
    }

    async fn send_typing(&self, _conversation_key: &str) -> Result<(), ValetError> {
        self.typing_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn receive_returns_injected_messages_in_order() {
        let channel = MockChannel::new();
        channel.inject(MockChannel::dm("c1", "alice", "first")).await;
        channel.inject(MockChannel::dm("c1", "alice", "second")).await;

        assert_eq!(channel.receive().await.unwrap().text, "first");
        assert_eq!(channel.receive().await.unwrap().text, "second");
    }

    #[tokio::test]
    async fn receive_waits_for_injection() {
        let channel = Arc::new(MockChannel::new());
        let injector = Arc::clone(&channel);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            injector.inject(MockChannel::dm("c1", "alice", "delayed")).await;
        });

        let received =
            tokio::time::timeout(std::time::Duration::from_secs(2), channel.receive())
                .await
                .expect("receive timed out")
                .unwrap();
        assert_eq!(received.text, "delayed");
    }

    #[tokio::test]
    async fn send_text_is_captured() {
        let channel = MockChannel::new();
        channel.send_text("c1", "hello", Some("42")).await.unwrap();

        let sent = channel.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].conversation_key, "c1");
        assert_eq!(sent[0].text, "hello");
        assert_eq!(sent[0].reply_to.as_deref(), Some("42"));
    }
}
