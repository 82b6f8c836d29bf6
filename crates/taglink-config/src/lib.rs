// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # taglink configuration
//!
//! Type-safe configuration for the tag-ingestion coordinator:
//! - TOML file parsing (`taglink.toml`)
//! - Environment variable overrides (`TAGLINK_*`)
//! - CLI argument overrides (dotted keys such as `reader.host`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use taglink_config::load_config;
//!
//! let config = load_config(None, None).expect("Failed to load config");
//! println!("Push channel: {}:{}", config.server.bind_address, config.server.port);
//! println!("Debounce: {:?}", config.timing.debounce());
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{apply_cli_overrides, apply_environment_overrides, find_config_file, load_config};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TagLinkConfig::default();
        assert!(validate_config(&config).is_ok());
    }
}
