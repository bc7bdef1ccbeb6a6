// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Valet assistant.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, and environment
//! variable overrides.
//!
//! # Usage
//!
//! ```no_run
//! use valet_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Agent name: {}", config.agent.name);
//! ```

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    AgentConfig, MemoryConfig, ProviderConfig, SchedulerConfig, SessionConfig, StorageConfig,
    TelegramConfig, ValetConfig,
};

use thiserror::Error;

/// A configuration error, either from parsing/merging or from semantic
/// validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Figment(#[from] figment::Error),

    #[error("{message}")]
    Validation { message: String },
}

/// Load configuration from the XDG hierarchy and validate it.
///
/// Returns either a valid [`ValetConfig`] or the list of collected errors.
pub fn load_and_validate() -> Result<ValetConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(vec![ConfigError::Figment(err)]),
    }
}

/// Load configuration from a TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<ValetConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(vec![ConfigError::Figment(err)]),
    }
}

/// Print configuration errors to stderr, one per line.
pub fn render_errors(errors: &[ConfigError]) {
    for error in errors {
        eprintln!("error: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_and_validate_str_happy_path() {
        let config = load_and_validate_str("[agent]\nname = \"jeeves\"\n").unwrap();
        assert_eq!(config.agent.name, "jeeves");
    }

    #[test]
    fn load_and_validate_str_reports_validation_errors() {
        let errors =
            load_and_validate_str("[session]\nhistory_limit = 0\n").unwrap_err();
        assert!(errors[0].to_string().contains("history_limit"));
    }
}
