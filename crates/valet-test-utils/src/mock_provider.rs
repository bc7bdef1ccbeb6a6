// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock completion provider for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with a scripted response
//! queue, optional per-call latency, and concurrency bookkeeping so tests
//! can assert whether completion calls overlapped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use valet_core::{Adapter, AdapterType, ProviderAdapter, Turn, ValetError};

/// A mock completion provider that replays a scripted queue.
///
/// Each queue entry is either a reply text or an error message. When the
/// queue is empty, a default "mock reply" text is returned.
pub struct MockProvider {
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Vec<Turn>>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Pre-loads reply texts.
    pub fn with_replies(replies: Vec<&str>) -> Self {
        let provider = Self::new();
        {
            let mut script = provider.script.try_lock().unwrap();
            script.extend(replies.into_iter().map(|r| Ok(r.to_string())));
        }
        provider
    }

    /// Each completion call sleeps this long before answering. Useful for
    /// exercising overlap and timeout behavior.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn push_reply(&self, text: &str) {
        self.script.lock().await.push_back(Ok(text.to_string()));
    }

    /// Queues a failure; the corresponding `complete` call returns a
    /// provider error with this message.
    pub async fn push_failure(&self, message: &str) {
        self.script.lock().await.push_back(Err(message.to_string()));
    }

    /// The turn sequences this provider was called with, in order.
    pub async fn calls(&self) -> Vec<Vec<Turn>> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Highest number of `complete` calls that were ever in flight at
    /// once.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn shutdown(&self) -> Result<(), ValetError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, turns: &[Turn], _max_tokens: u32) -> Result<String, ValetError> {
        self.calls.lock().await.push(turns.to_vec());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let next = self.script.lock().await.pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ValetError::Provider {
                message,
                source: None,
            }),
            None => Ok("mock reply".to_string()),
        }
    }
}
