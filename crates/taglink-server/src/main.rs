// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use taglink_config::{load_config, TagLinkConfig};
use taglink_discovery::{detect_lan_subnet, discover_until_found, Prober};
use taglink_observability::{debug_flags_help, init_logging, CrateDebugFlags, LoggingOptions};
use taglink_server::SimulatedReader;
use tracing::{info, warn};

/// taglink - live RFID tag dashboard backend with transmit-power control
#[derive(Parser, Debug)]
#[command(name = "taglink", version, author, long_about = None, after_help = debug_flags_help())]
struct Args {
    /// Path to taglink.toml (default: search working directory and parents)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reader host; omit to discover one on the LAN
    #[arg(long)]
    reader_host: Option<String>,

    /// Reader LLRP port
    #[arg(short = 'p', long, alias = "port")]
    reader_port: Option<u16>,

    /// Comma-separated antenna ids, e.g. "1,2"
    #[arg(short, long)]
    antennas: Option<String>,

    /// Initial transmit power (0 = reader maximum, else 1..=30)
    #[arg(short = 'X', long)]
    tx_power: Option<u8>,

    /// Push channel bind address
    #[arg(long)]
    listen: Option<String>,

    /// Push channel port
    #[arg(long)]
    web_port: Option<u16>,

    /// Relay endpoint URL ("" disables the relay)
    #[arg(long)]
    relay_endpoint: Option<String>,

    /// Enable debug logging for a crate (repeatable; "all" for every crate)
    #[arg(long = "debug", value_name = "CRATE")]
    debug: Vec<String>,
}

impl Args {
    /// Dotted-key overrides for the config loader
    fn overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                overrides.insert(key.to_string(), value);
            }
        };
        set("reader.host", self.reader_host.clone());
        set("reader.port", self.reader_port.map(|p| p.to_string()));
        set("reader.antennas", self.antennas.clone());
        set("reader.tx_power", self.tx_power.map(|p| p.to_string()));
        set("server.bind_address", self.listen.clone());
        set("server.port", self.web_port.map(|p| p.to_string()));
        set("relay.endpoint", self.relay_endpoint.clone());
        overrides
    }
}

/// Split `--debug-<crate>` flags off before clap sees the arguments
fn split_debug_args() -> (Vec<String>, Vec<String>) {
    std::env::args().partition(|arg| arg.starts_with("--debug-"))
}

async fn resolve_reader_host(config: &TagLinkConfig) -> Ipv4Addr {
    let prober = Prober::new(config.discovery.port, config.discovery.probe_timeout());
    discover_until_found(
        detect_lan_subnet,
        &prober,
        config.discovery.pool_size,
        config.discovery.retry_interval(),
    )
    .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (debug_args, args) = split_debug_args();
    let args = Args::parse_from(args);

    let mut config = load_config(args.config.as_deref(), Some(&args.overrides()))
        .context("Failed to load configuration")?;

    let mut debug_flags = CrateDebugFlags::from_args(debug_args).with_environment();
    for name in &args.debug {
        if name == "all" {
            debug_flags.enable_all();
        } else {
            debug_flags.enable(name);
        }
    }
    let logging = LoggingOptions {
        level: config.logging.level.clone(),
        log_dir: Some(PathBuf::from(&config.logging.log_dir)),
        ..LoggingOptions::default()
    };
    let _log_guard = init_logging(&debug_flags, &logging)?;

    info!("taglink v{}", taglink_server::VERSION);

    if config.reader.host().is_none() {
        info!("No reader host configured, scanning the LAN");
        let host = resolve_reader_host(&config).await;
        info!("Using reader {}", host);
        config.reader.host = host.to_string();
    }

    taglink_server::run(&config, SimulatedReader::default(), shutdown_signal()).await?;
    info!("Shutdown complete");
    Ok(())
}
