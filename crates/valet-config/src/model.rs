// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Valet assistant.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. All sections are optional and default to
//! sensible values; the core receives these values at construction and
//! never reads mutable global state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level Valet configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ValetConfig {
    /// Agent identity and prompt settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Rolling-history capacity and cold-start restore settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Telegram transport settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Completion provider (Anthropic API) settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Proactive task scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Semantic memory settings.
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Agent identity and prompt configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the assistant.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inline system prompt string. Overridden by `system_prompt_file` if
    /// both are set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a markdown file containing the system prompt. Takes
    /// precedence over `system_prompt` if both are set.
    #[serde(default)]
    pub system_prompt_file: Option<String>,

    /// Per-conversation prompt overrides, appended to the global preamble
    /// as additional context for that conversation key.
    #[serde(default)]
    pub conversation_prompts: HashMap<String, String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            system_prompt: None,
            system_prompt_file: None,
            conversation_prompts: HashMap::new(),
        }
    }
}

fn default_agent_name() -> String {
    "valet".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Session history configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Maximum number of non-system turns kept in a session's rolling
    /// history. The system preamble is never evicted.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Number of persisted messages replayed into a fresh session on
    /// cold-start restore.
    #[serde(default = "default_restore_limit")]
    pub restore_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            restore_limit: default_restore_limit(),
        }
    }
}

fn default_history_limit() -> usize {
    40
}

fn default_restore_limit() -> usize {
    20
}

/// Telegram transport configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. `None` disables the Telegram transport.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// List of allowed Telegram user IDs or usernames. An empty list
    /// rejects every sender (secure default).
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

/// Completion provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key. `None` requires the environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Default model for completion requests.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum tokens to generate per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Deadline for one completion call, in seconds. Bounds how long a
    /// conversation lock can be held by a hung model call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("valet/valet.db").display().to_string())
        .unwrap_or_else(|| "valet.db".to_string())
}

/// Scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Whether the proactive task scheduler runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tick interval in seconds. Due-ness is evaluated at minute
    /// granularity; the 59-second debounce suppresses duplicate firings
    /// when this is shorter than 60.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            tick_secs: default_tick_secs(),
        }
    }
}

fn default_tick_secs() -> u64 {
    60
}

/// Semantic memory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Whether recall/save against the memory port is attempted at all.
    #[serde(default)]
    pub enabled: bool,

    /// Maximum number of recalled texts injected per turn.
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            recall_limit: default_recall_limit(),
        }
    }
}

fn default_recall_limit() -> usize {
    3
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = ValetConfig::default();
        assert_eq!(config.agent.name, "valet");
        assert_eq!(config.session.history_limit, 40);
        assert_eq!(config.session.restore_limit, 20);
        assert_eq!(config.scheduler.tick_secs, 60);
        assert!(config.scheduler.enabled);
        assert!(!config.memory.enabled);
        assert!(config.telegram.bot_token.is_none());
        assert!(config.telegram.allowed_users.is_empty());
    }

    #[test]
    fn provider_defaults() {
        let provider = ProviderConfig::default();
        assert_eq!(provider.max_tokens, 2048);
        assert_eq!(provider.api_version, "2023-06-01");
        assert_eq!(provider.timeout_secs, 120);
    }
}
