// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `valet serve` command implementation.
//!
//! Wires the Telegram channel, Anthropic provider, SQLite storage, session
//! manager, keyed serializer, message pipeline, and scheduler together,
//! then runs the agent loop until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use valet_agent::{
    AgentLoop, KeyedSerializer, MessagePipeline, PipelineSettings, SessionManager, shutdown,
};
use valet_anthropic::AnthropicProvider;
use valet_config::ValetConfig;
use valet_core::{
    AllowAllGate, ChannelAdapter, StorageAdapter, Tool, ValetError,
};
use valet_cron::{CancelTaskTool, ListTasksTool, ScheduleTaskTool, Scheduler};
use valet_storage::SqliteStorage;
use valet_telegram::TelegramChannel;

/// How long a quiet conversation's serializer worker stays alive.
const SERIALIZER_IDLE: Duration = Duration::from_secs(60);

const DEFAULT_SYSTEM_PROMPT: &str = "You are Valet, a helpful personal assistant. \
     Be concise, direct, and warm. You are talking over a chat app, so keep \
     replies short unless the user asks for detail.";

const SCHEDULER_PROMPT_FRAGMENT: &str = "You can manage recurring tasks with the \
     schedule_task, list_tasks, and cancel_task tools. Cron expressions have 5 \
     fields: minute hour day-of-month month day-of-week.";

/// Runs the `valet serve` command.
pub async fn run_serve(config: ValetConfig) -> Result<(), ValetError> {
    init_tracing(&config.agent.log_level);

    info!(agent = %config.agent.name, "starting valet serve");

    let storage = {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        Arc::new(storage)
    };

    let system_prompt = resolve_system_prompt(&config)?;

    // Tools and the prompt fragments that advertise them.
    let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
    let mut prompt_fragments = Vec::new();
    if config.scheduler.enabled {
        tools.push(Arc::new(ScheduleTaskTool::new(storage.clone())));
        tools.push(Arc::new(ListTasksTool::new(storage.clone())));
        tools.push(Arc::new(CancelTaskTool::new(storage.clone())));
        prompt_fragments.push(SCHEDULER_PROMPT_FRAGMENT.to_string());
    }

    let provider = Arc::new(AnthropicProvider::from_config(
        &config.provider,
        tools,
        Arc::new(AllowAllGate),
    )?);

    if config.memory.enabled {
        // No memory backend is compiled into this build; the port stays
        // empty and recall/save are skipped.
        warn!("memory.enabled is set but no memory adapter is available");
    }

    let channel: Arc<dyn ChannelAdapter> = {
        let mut channel = TelegramChannel::new(config.telegram.clone())?;
        channel.connect().await?;
        Arc::new(channel)
    };

    let sessions = Arc::new(SessionManager::new(
        storage.clone() as Arc<dyn StorageAdapter>,
        config.session.history_limit,
        config.session.restore_limit,
    ));
    let serializer = KeyedSerializer::new(SERIALIZER_IDLE);

    let settings =
        PipelineSettings::from_config(&config, system_prompt.clone(), prompt_fragments);
    let provider_timeout = settings.provider_timeout;
    let max_tokens = settings.max_tokens;
    let pipeline = Arc::new(MessagePipeline::new(
        settings,
        sessions.clone(),
        storage.clone(),
        provider.clone(),
        None,
        channel.clone(),
    ));

    let cancel = CancellationToken::new();
    shutdown::install_signal_handler(cancel.clone());

    let scheduler_handle = if config.scheduler.enabled {
        let scheduler = Scheduler::new(
            storage.clone(),
            provider.clone(),
            channel.clone(),
            sessions.clone(),
            serializer.clone(),
            Duration::from_secs(config.scheduler.tick_secs),
            system_prompt,
            max_tokens,
            provider_timeout,
        );
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            scheduler.run(cancel).await;
        }))
    } else {
        info!("scheduler disabled by configuration");
        None
    };

    let agent = AgentLoop::new(channel.clone(), pipeline, serializer);
    agent.run(cancel.clone()).await?;

    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "scheduler task panicked");
        }
    }

    if let Err(e) = channel.shutdown().await {
        warn!(error = %e, "channel shutdown failed");
    }
    storage.close().await?;

    info!("valet stopped");
    Ok(())
}

/// Resolves the system prompt: file takes precedence over the inline
/// string, with a built-in default when neither is set.
fn resolve_system_prompt(config: &ValetConfig) -> Result<String, ValetError> {
    if let Some(path) = &config.agent.system_prompt_file {
        return std::fs::read_to_string(path).map_err(|e| {
            ValetError::Config(format!("cannot read agent.system_prompt_file '{path}': {e}"))
        });
    }
    Ok(config
        .agent
        .system_prompt
        .clone()
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()))
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("valet={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_falls_back_to_the_default() {
        let config = ValetConfig::default();
        let prompt = resolve_system_prompt(&config).unwrap();
        assert!(prompt.contains("Valet"));
    }

    #[test]
    fn inline_system_prompt_is_used() {
        let mut config = ValetConfig::default();
        config.agent.system_prompt = Some("be terse".into());
        assert_eq!(resolve_system_prompt(&config).unwrap(), "be terse");
    }

    #[test]
    fn system_prompt_file_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.md");
        std::fs::write(&path, "from file").unwrap();

        let mut config = ValetConfig::default();
        config.agent.system_prompt = Some("inline".into());
        config.agent.system_prompt_file = Some(path.display().to_string());
        assert_eq!(resolve_system_prompt(&config).unwrap(), "from file");
    }

    #[test]
    fn missing_system_prompt_file_is_a_config_error() {
        let mut config = ValetConfig::default();
        config.agent.system_prompt_file = Some("/nonexistent/prompt.md".into());
        assert!(matches!(
            resolve_system_prompt(&config),
            Err(ValetError::Config(_))
        ));
    }
}
