// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, applied in order:
//! 1. TOML file (falls back to built-in defaults when no file exists)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{validate_config, ConfigError, ConfigResult, TagLinkConfig, TagSelection};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name searched for when no explicit path is given
pub const CONFIG_FILE_NAME: &str = "taglink.toml";

/// Environment variable pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "TAGLINK_CONFIG_PATH";

/// Find the taglink configuration file
///
/// Search order:
/// 1. `TAGLINK_CONFIG_PATH` environment variable
/// 2. Current working directory: `./taglink.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "{} points at a missing file: {}",
            CONFIG_PATH_ENV,
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is searched for and
///   built-in defaults are used when none exists.
/// * `cli_args` - Optional CLI overrides keyed by dotted path (`"reader.host"`)
///
/// # Errors
///
/// Returns an error if an explicit file is missing, the TOML is invalid, an override value
/// cannot be parsed, or the final configuration fails validation.
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<TagLinkConfig> {
    let mut config = match config_path {
        Some(path) => parse_file(path)?,
        None => match find_config_file() {
            Ok(path) => parse_file(&path)?,
            Err(ConfigError::FileNotFound(_)) if env::var(CONFIG_PATH_ENV).is_err() => {
                TagLinkConfig::default()
            }
            Err(e) => return Err(e),
        },
    };

    apply_environment_overrides(&mut config)?;

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    validate_config(&config)?;
    Ok(config)
}

fn parse_file(path: &Path) -> ConfigResult<TagLinkConfig> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Environment variable to dotted-key mapping
const ENV_KEYS: &[(&str, &str)] = &[
    ("TAGLINK_READER_HOST", "reader.host"),
    ("TAGLINK_READER_PORT", "reader.port"),
    ("TAGLINK_ANTENNAS", "reader.antennas"),
    ("TAGLINK_TX_POWER", "reader.tx_power"),
    ("TAGLINK_SELECTION", "reader.selection"),
    ("TAGLINK_BIND_ADDRESS", "server.bind_address"),
    ("TAGLINK_WEB_PORT", "server.port"),
    ("TAGLINK_NOTIFY_SUPPRESS_MS", "timing.notify_suppress_ms"),
    ("TAGLINK_EXPIRE_MS", "timing.expire_ms"),
    ("TAGLINK_DEBOUNCE_MS", "timing.debounce_ms"),
    ("TAGLINK_RELAY_ENDPOINT", "relay.endpoint"),
    ("TAGLINK_RELAY_INTERVAL_MS", "relay.interval_ms"),
    ("TAGLINK_DISCOVERY_POOL_SIZE", "discovery.pool_size"),
    ("TAGLINK_PROBE_TIMEOUT_MS", "discovery.probe_timeout_ms"),
    ("TAGLINK_LOG_LEVEL", "logging.level"),
];

/// Apply environment variable overrides to configuration
///
/// Supported variables: `TAGLINK_READER_HOST`, `TAGLINK_READER_PORT`, `TAGLINK_ANTENNAS`,
/// `TAGLINK_TX_POWER`, `TAGLINK_SELECTION`, `TAGLINK_BIND_ADDRESS`, `TAGLINK_WEB_PORT`,
/// `TAGLINK_NOTIFY_SUPPRESS_MS`, `TAGLINK_EXPIRE_MS`, `TAGLINK_DEBOUNCE_MS`,
/// `TAGLINK_RELAY_ENDPOINT`, `TAGLINK_RELAY_INTERVAL_MS`, `TAGLINK_DISCOVERY_POOL_SIZE`,
/// `TAGLINK_PROBE_TIMEOUT_MS`, `TAGLINK_LOG_LEVEL`.
pub fn apply_environment_overrides(config: &mut TagLinkConfig) -> ConfigResult<()> {
    for (var, key) in ENV_KEYS {
        if let Ok(value) = env::var(var) {
            apply_override(config, key, &value)?;
        }
    }
    Ok(())
}

/// Apply CLI argument overrides to configuration
///
/// Keys are dotted paths, e.g. `{"reader.host": "10.0.0.7", "server.port": "4100"}`.
pub fn apply_cli_overrides(
    config: &mut TagLinkConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    for (key, value) in cli_args {
        apply_override(config, key, value)?;
    }
    Ok(())
}

fn parse<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = {:?}", key, value)))
}

fn parse_antennas(key: &str, value: &str) -> ConfigResult<Vec<u16>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse(key, s))
        .collect()
}

fn apply_override(config: &mut TagLinkConfig, key: &str, value: &str) -> ConfigResult<()> {
    match key {
        "reader.host" => config.reader.host = value.trim().to_string(),
        "reader.port" => config.reader.port = parse(key, value)?,
        "reader.antennas" => config.reader.antennas = parse_antennas(key, value)?,
        "reader.tx_power" => config.reader.tx_power = parse(key, value)?,
        "reader.chip_id_length" => config.reader.chip_id_length = parse(key, value)?,
        "reader.selection" => {
            config.reader.selection = match value.trim().to_lowercase().as_str() {
                "all" => TagSelection::All,
                "strongest" => TagSelection::Strongest,
                _ => return Err(ConfigError::InvalidValue(format!("{} = {:?}", key, value))),
            }
        }
        "server.bind_address" => config.server.bind_address = value.trim().to_string(),
        "server.port" => config.server.port = parse(key, value)?,
        "server.subscriber_queue" => config.server.subscriber_queue = parse(key, value)?,
        "server.ingest_queue" => config.server.ingest_queue = parse(key, value)?,
        "timing.notify_suppress_ms" => config.timing.notify_suppress_ms = parse(key, value)?,
        "timing.expire_ms" => config.timing.expire_ms = parse(key, value)?,
        "timing.sweep_interval_ms" => config.timing.sweep_interval_ms = parse(key, value)?,
        "timing.debounce_ms" => config.timing.debounce_ms = parse(key, value)?,
        "relay.endpoint" => config.relay.endpoint = value.trim().to_string(),
        "relay.interval_ms" => config.relay.interval_ms = parse(key, value)?,
        "relay.timeout_ms" => config.relay.timeout_ms = parse(key, value)?,
        "discovery.port" => config.discovery.port = parse(key, value)?,
        "discovery.pool_size" => config.discovery.pool_size = parse(key, value)?,
        "discovery.probe_timeout_ms" => config.discovery.probe_timeout_ms = parse(key, value)?,
        "discovery.retry_interval_ms" => config.discovery.retry_interval_ms = parse(key, value)?,
        "logging.level" => config.logging.level = value.trim().to_string(),
        "logging.log_dir" => config.logging.log_dir = value.trim().to_string(),
        _ => {
            return Err(ConfigError::InvalidValue(format!(
                "unknown configuration key '{}'",
                key
            )))
        }
    }
    Ok(())
}
