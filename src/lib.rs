// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # taglink
//!
//! Backend for a live RFID tag dashboard. A fixed reader streams tag
//! sightings; taglink keeps a live table of what is in the field, pushes
//! throttled snapshots to WebSocket subscribers, relays sightings to an HTTP
//! collaborator and applies operator transmit-power changes with debouncing.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! taglink = "0.1"  # Default: server + discovery
//! ```
//!
//! ```rust,no_run
//! use taglink::prelude::*;
//!
//! # async fn demo() -> taglink::server::ServerResult<()> {
//! let mut config = TagLinkConfig::default();
//! config.reader.host = "192.168.1.20".to_string();
//! let server = start(&config, SimulatedReader::default()).await?;
//! println!("push channel on ws://{}", server.local_addr());
//! server.shutdown().await
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - **`server`** (default): coordinator runtime, push channel, relay
//! - **`discovery`** (default): LAN reader discovery
//! - **`file-logging`**: JSON log files in a timestamped run folder
//!
//! ## Architecture
//!
//! ```text
//! reader thread ──> ingest bridge ──┐
//!                                   v
//! push connections ──> control ──> coordinator ──> subscribers
//!                                   │   ^
//!                  reconnect worker ┘   └── relay tasks
//! ```
//!
//! The coordinator is a single task that owns the live table, the subscriber
//! set and the reconfiguration state machine; everything else talks to it
//! through messages.
//!
//! ## License
//!
//! Apache-2.0

// Re-export foundation
pub use taglink_config as config;
pub use taglink_observability as observability;

// Re-export core
pub use taglink_core as core;

// Re-export runtime
#[cfg(feature = "discovery")]
pub use taglink_discovery as discovery;

#[cfg(feature = "server")]
pub use taglink_server as server;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{load_config, TagLinkConfig};
    pub use crate::core::{Normalizer, ReconfigController, SelectionPolicy, TagStore};

    #[cfg(feature = "discovery")]
    pub use crate::discovery::{discover_until_found, Ipv4Subnet, Prober};

    #[cfg(feature = "server")]
    pub use crate::server::{start, CoordinatorHandle, ReaderClient, RunningServer, SimulatedReader};
}
