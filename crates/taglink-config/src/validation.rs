// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Collects every problem in one pass so the operator sees all of them at once.

use crate::{ConfigError, ConfigResult, TagLinkConfig, MAX_TX_POWER};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    OutOfRange { field: String, value: u64, min: u64, max: u64 },
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { field, value, min, max } => {
                write!(f, "{} = {} is outside valid range ({}-{})", field, value, min, max)
            }
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every failed rule
pub fn validate_config(config: &TagLinkConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// Run every rule and return the violations
pub fn collect_errors(config: &TagLinkConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    if config.reader.tx_power > MAX_TX_POWER {
        errors.push(ConfigValidationError::OutOfRange {
            field: "reader.tx_power".to_string(),
            value: config.reader.tx_power as u64,
            min: 0,
            max: MAX_TX_POWER as u64,
        });
    }
    if config.reader.antennas.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "reader.antennas".to_string(),
        });
    }
    if config.reader.antennas.contains(&0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "reader.antennas".to_string(),
            reason: "antenna ids start at 1".to_string(),
        });
    }
    if config.reader.chip_id_length == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "reader.chip_id_length".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    // server.port = 0 binds an OS-assigned port
    for (field, port) in [
        ("reader.port", config.reader.port),
        ("discovery.port", config.discovery.port),
    ] {
        if port == 0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: "port must be non-zero".to_string(),
            });
        }
    }

    for (field, value) in [
        ("timing.notify_suppress_ms", config.timing.notify_suppress_ms),
        ("timing.expire_ms", config.timing.expire_ms),
        ("timing.sweep_interval_ms", config.timing.sweep_interval_ms),
        ("timing.debounce_ms", config.timing.debounce_ms),
        ("relay.interval_ms", config.relay.interval_ms),
        ("relay.timeout_ms", config.relay.timeout_ms),
        ("discovery.probe_timeout_ms", config.discovery.probe_timeout_ms),
        ("discovery.retry_interval_ms", config.discovery.retry_interval_ms),
    ] {
        if value == 0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: "duration must be greater than 0".to_string(),
            });
        }
    }

    for (field, value) in [
        ("server.subscriber_queue", config.server.subscriber_queue),
        ("server.ingest_queue", config.server.ingest_queue),
        ("discovery.pool_size", config.discovery.pool_size),
    ] {
        if value == 0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
    }

    if let Some(endpoint) = config.relay.endpoint() {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            errors.push(ConfigValidationError::InvalidValue {
                field: "relay.endpoint".to_string(),
                reason: format!("'{}' is not an http(s) URL", endpoint),
            });
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_all_problems() {
        let mut config = TagLinkConfig::default();
        config.reader.tx_power = 40;
        config.reader.antennas.clear();
        config.timing.debounce_ms = 0;
        config.relay.endpoint = "ftp://example".to_string();

        let errors = collect_errors(&config);
        assert_eq!(errors.len(), 4);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_power_means_reader_maximum() {
        let mut config = TagLinkConfig::default();
        config.reader.tx_power = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_disabled_relay_is_valid() {
        let mut config = TagLinkConfig::default();
        config.relay.endpoint = String::new();
        assert!(collect_errors(&config).is_empty());
    }

    #[test]
    fn test_ephemeral_push_port_allowed() {
        let mut config = TagLinkConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_ok());

        config.reader.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_antenna_zero_rejected() {
        let mut config = TagLinkConfig::default();
        config.reader.antennas = vec![0, 1];
        let errors = collect_errors(&config);
        assert!(matches!(
            errors.as_slice(),
            [ConfigValidationError::InvalidValue { field, .. }] if field == "reader.antennas"
        ));
    }
}
