// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-key work serialization.
//!
//! The [`KeyedSerializer`] guarantees that work items sharing a key run
//! strictly one at a time, in submission order, while items under
//! different keys run concurrently. A key's worker task retires after an
//! idle window so that quiet conversations hold no resources.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::Notify;
use tracing::{debug, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct QueueState {
    items: VecDeque<Job>,
    /// True while a worker task owns this key.
    running: bool,
}

struct KeyEntry {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl KeyEntry {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                running: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Locks the queue state, recovering from a poisoned mutex. The lock
    /// is only ever held for pointer-sized bookkeeping, never across a
    /// job, so the state is always coherent.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct Inner {
    queues: DashMap<String, Arc<KeyEntry>>,
    idle_timeout: Duration,
}

/// Routes work items to per-key FIFO queues, each drained by at most one
/// worker task. Cheap to clone; clones share the same queues.
#[derive(Clone)]
pub struct KeyedSerializer {
    inner: Arc<Inner>,
}

impl KeyedSerializer {
    /// Creates a serializer whose idle workers retire after `idle_timeout`
    /// without new work.
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                queues: DashMap::new(),
                idle_timeout,
            }),
        }
    }

    /// Submits a work item for `key`. Items for the same key execute in
    /// submission order; a panicking item is caught and logged without
    /// stalling the items behind it.
    pub fn enqueue<F>(&self, key: &str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let job: Job = Box::pin(fut);

        // Push while holding the map entry guard. The guard pins the map
        // shard, so a retiring worker's remove_if cannot interleave with
        // this push and strand the item.
        let mut spawn_worker = false;
        let entry = {
            let entry = self
                .inner
                .queues
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(KeyEntry::new()));
            {
                let mut state = entry.lock();
                state.items.push_back(job);
                if !state.running {
                    state.running = true;
                    spawn_worker = true;
                }
            }
            Arc::clone(entry.value())
        };

        if spawn_worker {
            let inner = Arc::clone(&self.inner);
            let key = key.to_string();
            tokio::spawn(async move {
                run_worker(inner, key, entry).await;
            });
        } else {
            entry.notify.notify_one();
        }
    }

    /// Number of keys with a live queue entry.
    pub fn active_keys(&self) -> usize {
        self.inner.queues.len()
    }

    /// True when no key has queued or running work.
    pub fn is_idle(&self) -> bool {
        self.inner.queues.iter().all(|entry| {
            let state = entry.lock();
            state.items.is_empty() && !state.running
        })
    }

    /// Waits until all queued work has completed, up to `timeout`.
    /// Returns false if work was still in flight when the timeout hit.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.is_idle() {
            if tokio::time::Instant::now() >= deadline {
                warn!("serializer drain timed out with work still in flight");
                return false;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        true
    }
}

/// Drains one key's queue. Owns the key while `running` is true; retires
/// and removes the map entry once the queue stays empty for the idle
/// window.
async fn run_worker(inner: Arc<Inner>, key: String, entry: Arc<KeyEntry>) {
    debug!(key = %key, "serializer worker started");
    loop {
        let job = { entry.lock().items.pop_front() };

        if let Some(job) = job {
            if let Err(panic) = std::panic::AssertUnwindSafe(job).catch_unwind().await {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                warn!(key = %key, panic = %msg, "work item panicked");
            }
            continue;
        }

        // Queue empty: wait for new work or retire after the idle window.
        let wake = tokio::time::timeout(inner.idle_timeout, entry.notify.notified()).await;
        if wake.is_ok() {
            continue;
        }

        {
            let mut state = entry.lock();
            if !state.items.is_empty() {
                continue;
            }
            state.running = false;
        }

        // A push may have slipped in after `running` dropped; that push
        // saw running == false and spawned a fresh worker, so the
        // predicate below fails and the entry survives for it.
        inner.queues.remove_if(&key, |_, e| {
            let state = e.lock();
            state.items.is_empty() && !state.running
        });
        debug!(key = %key, "serializer worker retired");
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn short_idle() -> KeyedSerializer {
        KeyedSerializer::new(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn same_key_runs_in_submission_order() {
        let ser = short_idle();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20u32 {
            let log = Arc::clone(&log);
            ser.enqueue("alice", async move {
                // Yield so out-of-order execution would have a chance to show.
                tokio::task::yield_now().await;
                log.lock().unwrap().push(i);
            });
        }

        assert!(ser.drain(Duration::from_secs(5)).await);
        let seen = log.lock().unwrap().clone();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn same_key_never_overlaps() {
        let ser = short_idle();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            ser.enqueue("alice", async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        }

        assert!(ser.drain(Duration::from_secs(5)).await);
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_run_concurrently() {
        let ser = short_idle();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        for key in ["a", "b", "c", "d"] {
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            ser.enqueue(key, async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        }

        assert!(ser.drain(Duration::from_secs(5)).await);
        assert!(
            max_seen.load(Ordering::SeqCst) > 1,
            "expected cross-key overlap, saw none"
        );
    }

    #[tokio::test]
    async fn panicking_item_does_not_stall_the_queue() {
        let ser = short_idle();
        let done = Arc::new(AtomicUsize::new(0));

        ser.enqueue("alice", async {
            panic!("boom");
        });
        let done2 = Arc::clone(&done);
        ser.enqueue("alice", async move {
            done2.fetch_add(1, Ordering::SeqCst);
        });

        assert!(ser.drain(Duration::from_secs(5)).await);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idle_worker_retires_and_key_is_reusable() {
        let ser = short_idle();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        ser.enqueue("alice", async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(ser.drain(Duration::from_secs(5)).await);

        // Past the idle window the entry should be gone.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(ser.active_keys(), 0);

        let c = Arc::clone(&count);
        ser.enqueue("alice", async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(ser.drain(Duration::from_secs(5)).await);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn enqueue_during_retirement_is_not_lost() {
        // Hammer the enqueue/retire race: a tiny idle window plus pushes
        // spaced around it must never drop an item.
        let ser = KeyedSerializer::new(Duration::from_millis(1));
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let c = Arc::clone(&count);
            ser.enqueue("alice", async move {
                c.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert!(ser.drain(Duration::from_secs(10)).await);
        assert_eq!(count.load(Ordering::SeqCst), 100);
    }
}
