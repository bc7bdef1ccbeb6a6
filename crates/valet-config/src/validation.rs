// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes. Collects all errors instead of failing fast.

use crate::ConfigError;
use crate::model::ValetConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &ValetConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.session.history_limit == 0 {
        errors.push(ConfigError::Validation {
            message: "session.history_limit must be at least 1".to_string(),
        });
    }

    if config.scheduler.tick_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "scheduler.tick_secs must be at least 1".to_string(),
        });
    }

    if config.provider.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "provider.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.provider.max_tokens == 0 {
        errors.push(ConfigError::Validation {
            message: "provider.max_tokens must be at least 1".to_string(),
        });
    }

    if let Some(ref path) = config.agent.system_prompt_file
        && path.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "agent.system_prompt_file must not be an empty path".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ValetConfig::default()).is_ok());
    }

    #[test]
    fn zero_history_limit_is_rejected() {
        let mut config = ValetConfig::default();
        config.session.history_limit = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("history_limit"));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = ValetConfig::default();
        config.session.history_limit = 0;
        config.scheduler.tick_secs = 0;
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
