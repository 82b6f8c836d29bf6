// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `taglink.toml`. Durations are stored as milliseconds so the file stays
//! human-editable; accessor methods hand out [`Duration`] values.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default LLRP port used by the reader and by the discovery probe.
pub const DEFAULT_READER_PORT: u16 = 5084;

/// Upper bound of the transmit power scale exposed to operators.
pub const MAX_TX_POWER: u8 = 30;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TagLinkConfig {
    pub reader: ReaderConfig,
    pub server: ServerConfig,
    pub timing: TimingConfig,
    pub relay: RelayConfig,
    pub discovery: DiscoveryConfig,
    pub logging: LoggingConfig,
}

/// How a tag batch is reduced before it reaches the live table
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TagSelection {
    /// Keep every reading in the batch
    #[default]
    All,
    /// Keep only the strongest-signal reading of each batch
    Strongest,
}

/// Reader connection settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReaderConfig {
    /// Reader host; empty means "discover on the LAN"
    pub host: String,
    pub port: u16,
    pub antennas: Vec<u16>,
    /// Initial transmit power (0 = reader maximum)
    pub tx_power: u8,
    /// Number of trailing identifier characters forming the chip id
    pub chip_id_length: usize,
    pub selection: TagSelection,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_READER_PORT,
            antennas: vec![1],
            tx_power: MAX_TX_POWER,
            chip_id_length: 5,
            selection: TagSelection::All,
        }
    }
}

impl ReaderConfig {
    /// Configured host, or `None` when discovery should pick one
    pub fn host(&self) -> Option<&str> {
        let host = self.host.trim();
        if host.is_empty() {
            None
        } else {
            Some(host)
        }
    }
}

/// Push channel (WebSocket) settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Outbound frames buffered per subscriber before a send counts as failed
    pub subscriber_queue: usize,
    /// Tag batches buffered between the reader thread and the coordinator
    pub ingest_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 4000,
            subscriber_queue: 64,
            ingest_queue: 1024,
        }
    }
}

impl ServerConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Coordinator timing windows
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub notify_suppress_ms: u64,
    pub expire_ms: u64,
    pub sweep_interval_ms: u64,
    pub debounce_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            notify_suppress_ms: 30_000,
            expire_ms: 30_000,
            sweep_interval_ms: 1_000,
            debounce_ms: 400,
        }
    }
}

impl TimingConfig {
    pub fn notify_suppress(&self) -> Duration {
        Duration::from_millis(self.notify_suppress_ms)
    }

    pub fn expire(&self) -> Duration {
        Duration::from_millis(self.expire_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Outbound relay to the external HTTP collaborator
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Endpoint URL; empty disables the relay
    pub endpoint: String,
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000/api/tag".to_string(),
            interval_ms: 30_000,
            timeout_ms: 1_000,
        }
    }
}

impl RelayConfig {
    pub fn endpoint(&self) -> Option<&str> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            None
        } else {
            Some(endpoint)
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// LAN discovery settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub port: u16,
    pub pool_size: usize,
    pub probe_timeout_ms: u64,
    pub retry_interval_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_READER_PORT,
            pool_size: 64,
            probe_timeout_ms: 1_000,
            retry_interval_ms: 30_000,
        }
    }
}

impl DiscoveryConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level (trace, debug, info, warn, error)
    pub level: String,
    /// Directory for JSON log files (only used with file logging enabled)
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: "./logs".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TagLinkConfig = toml::from_str(
            r#"
            [reader]
            host = "192.168.1.40"
            antennas = [1, 2]

            [timing]
            expire_ms = 10000
            "#,
        )
        .unwrap();

        assert_eq!(config.reader.host(), Some("192.168.1.40"));
        assert_eq!(config.reader.antennas, vec![1, 2]);
        assert_eq!(config.reader.port, DEFAULT_READER_PORT);
        assert_eq!(config.timing.expire(), Duration::from_secs(10));
        assert_eq!(config.timing.notify_suppress(), Duration::from_secs(30));
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_selection_parses_lowercase() {
        let config: TagLinkConfig = toml::from_str("[reader]\nselection = \"strongest\"").unwrap();
        assert_eq!(config.reader.selection, TagSelection::Strongest);
    }

    #[test]
    fn test_blank_host_and_endpoint_are_none() {
        let mut config = TagLinkConfig::default();
        config.reader.host = "  ".to_string();
        config.relay.endpoint = String::new();
        assert_eq!(config.reader.host(), None);
        assert_eq!(config.relay.endpoint(), None);
    }

    #[test]
    fn test_config_serializes_to_json() {
        let json = serde_json::to_value(TagLinkConfig::default()).unwrap();
        assert_eq!(json["timing"]["debounce_ms"], 400);
        assert_eq!(json["discovery"]["pool_size"], 64);
    }
}
