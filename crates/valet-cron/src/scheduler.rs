// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The proactive task scheduler.
//!
//! A fixed-interval tick loads active tasks, evaluates their cron
//! expressions against the current local wall clock, and enqueues each due
//! task's execution onto the shared [`KeyedSerializer`] under the task's
//! target conversation key. Scheduled firings therefore never interleave
//! with a live user turn for the same conversation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use valet_agent::{KeyedSerializer, SessionManager};
use valet_core::{
    ChannelAdapter, MessageStatus, PersistedMessage, ProviderAdapter, Role, ScheduledTask,
    StorageAdapter, Turn, ValetError,
};

use crate::expr::CronExpr;

/// A firing is suppressed while the last one is younger than this, so a
/// sub-minute tick interval cannot double-fire within one matching minute.
const DEBOUNCE_SECS: i64 = 59;

pub struct Scheduler {
    storage: Arc<dyn StorageAdapter>,
    provider: Arc<dyn ProviderAdapter>,
    channel: Arc<dyn ChannelAdapter>,
    sessions: Arc<SessionManager>,
    serializer: KeyedSerializer,
    tick: Duration,
    system_prompt: String,
    max_tokens: u32,
    provider_timeout: Duration,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        provider: Arc<dyn ProviderAdapter>,
        channel: Arc<dyn ChannelAdapter>,
        sessions: Arc<SessionManager>,
        serializer: KeyedSerializer,
        tick: Duration,
        system_prompt: String,
        max_tokens: u32,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            provider,
            channel,
            sessions,
            serializer,
            tick,
            system_prompt,
            max_tokens,
            provider_timeout,
        }
    }

    /// Runs the tick loop until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(tick_secs = self.tick.as_secs(), "scheduler started");
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first interval tick fires immediately; skip it so tasks are
        // only evaluated on the steady cadence.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick_once(Local::now().naive_local(), Utc::now()).await;
                }
            }
        }
        info!("scheduler stopped");
    }

    /// Evaluates every active task against one wall-clock instant and
    /// enqueues the due ones. Exposed so tests can drive ticks directly.
    pub async fn tick_once(&self, wall: NaiveDateTime, now: DateTime<Utc>) {
        let tasks = match self.storage.load_active_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(error = %e, "scheduler could not load tasks");
                return;
            }
        };

        for task in tasks {
            if !self.is_due(&task, wall, now) {
                continue;
            }

            // Record the firing before execution so a slow or failing run
            // cannot refire on the next tick.
            if let Err(e) = self.storage.update_task_last_run(&task.id, now).await {
                error!(task_id = %task.id, error = %e, "failed to record task firing");
                continue;
            }

            debug!(task_id = %task.id, conversation_key = %task.conversation_key, "task due");
            let storage = Arc::clone(&self.storage);
            let provider = Arc::clone(&self.provider);
            let channel = Arc::clone(&self.channel);
            let sessions = Arc::clone(&self.sessions);
            let system_prompt = self.system_prompt.clone();
            let max_tokens = self.max_tokens;
            let provider_timeout = self.provider_timeout;
            let conversation_key = task.conversation_key.clone();
            self.serializer.enqueue(&conversation_key, async move {
                if let Err(e) = execute_task(
                    &task,
                    sessions,
                    storage,
                    provider,
                    channel,
                    &system_prompt,
                    max_tokens,
                    provider_timeout,
                )
                .await
                {
                    error!(task_id = %task.id, error = %e, "scheduled task failed");
                }
            });
        }
    }

    fn is_due(&self, task: &ScheduledTask, wall: NaiveDateTime, now: DateTime<Utc>) -> bool {
        let matched = match CronExpr::parse(&task.cron_expr) {
            Ok(expr) => expr.matches(&wall),
            Err(e) => {
                warn!(task_id = %task.id, cron = %task.cron_expr, error = %e, "unparseable cron expression");
                false
            }
        };
        if !matched {
            return false;
        }
        match task.last_run {
            None => true,
            Some(last) => (now - last).num_seconds() >= DEBOUNCE_SECS,
        }
    }

    /// Waits for enqueued task executions to finish. Test hook.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.serializer.drain(timeout).await
    }
}

/// One isolated task execution: synthetic prompt through the shared
/// session, completion, persistence, delivery.
#[allow(clippy::too_many_arguments)]
async fn execute_task(
    task: &ScheduledTask,
    sessions: Arc<SessionManager>,
    storage: Arc<dyn StorageAdapter>,
    provider: Arc<dyn ProviderAdapter>,
    channel: Arc<dyn ChannelAdapter>,
    system_prompt: &str,
    max_tokens: u32,
    provider_timeout: Duration,
) -> Result<(), ValetError> {
    let key = &task.conversation_key;
    let session = sessions.get_or_restore(key, system_prompt).await?;

    // The synthetic prompt joins the live history but is never persisted;
    // only the assistant's message becomes a durable row.
    let prompt = format!(
        "Scheduled task due: {}. Compose the message to deliver to the user now.",
        task.description
    );
    let turns: Vec<Turn> = {
        let mut guard = session.lock().await;
        guard.push_turn(Turn::new(Role::User, prompt));
        guard.turns().to_vec()
    };

    let reply = tokio::time::timeout(provider_timeout, provider.complete(&turns, max_tokens))
        .await
        .map_err(|_| ValetError::Timeout {
            duration: provider_timeout,
        })??;

    {
        let mut guard = session.lock().await;
        guard.push_turn(Turn::new(Role::Assistant, reply.clone()));
    }

    storage
        .append_message(&PersistedMessage {
            id: Uuid::new_v4().to_string(),
            conversation_key: key.clone(),
            role: Role::Assistant,
            content: reply.clone(),
            transport_message_id: None,
            sender_name: None,
            sender_id: None,
            status: MessageStatus::Done,
            created_at: Utc::now().to_rfc3339(),
        })
        .await?;

    if let Err(e) = channel.send_text(key, &reply, None).await {
        warn!(task_id = %task.id, error = %e, "proactive message delivery failed");
    }

    info!(task_id = %task.id, conversation_key = %key, "scheduled task executed");
    Ok(())
}
