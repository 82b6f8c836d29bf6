// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # taglink-server
//!
//! Runtime for the tag-ingestion coordinator: wires a reader client, the
//! ingest bridge, the coordinator task, the WebSocket push channel and the
//! optional HTTP relay together.
//!
//! ```rust,no_run
//! use taglink_server::{start, SimulatedReader};
//!
//! # async fn demo() -> taglink_server::ServerResult<()> {
//! let mut config = taglink_config::TagLinkConfig::default();
//! config.reader.host = "192.168.1.20".to_string();
//! let server = start(&config, SimulatedReader::default()).await?;
//! println!("push channel on ws://{}", server.local_addr());
//! server.shutdown().await
//! # }
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bridge;
pub mod coordinator;
pub mod error;
pub mod push;
pub mod reader;
pub mod relay;
pub mod timer;

use std::future::Future;
use std::net::SocketAddr;

use taglink_config::{validate_config, TagLinkConfig, TagSelection};
use taglink_core::{Normalizer, ReaderTarget, SelectionPolicy};
use tokio::task::JoinHandle;
use tracing::info;

pub use bridge::{IngestBridge, TagBatch};
pub use coordinator::{
    ControlEvent, Coordinator, CoordinatorHandle, CoordinatorSettings, CoordinatorStatus,
};
pub use error::{ServerError, ServerResult};
pub use push::{ChannelSink, PushServer};
pub use reader::{
    ReaderClient, ReaderError, ReaderLink, ReaderResult, ReaderSettings, SimulatedReader,
    TagContentSelector, TagReportCallback,
};
pub use relay::{HttpRelay, RelayError};
pub use timer::DebounceTimer;

/// A started coordinator plus its push channel
pub struct RunningServer {
    local_addr: SocketAddr,
    handle: CoordinatorHandle,
    coordinator: JoinHandle<()>,
    push: JoinHandle<()>,
}

impl RunningServer {
    /// Address the push channel is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    /// Stop the coordinator, disconnect the reader and close the listener
    pub async fn shutdown(self) -> ServerResult<()> {
        self.handle.shutdown();
        let result = self.coordinator.await;
        self.push.abort();
        result.map_err(|e| ServerError::Task(e.to_string()))
    }
}

fn selection_policy(selection: TagSelection) -> SelectionPolicy {
    match selection {
        TagSelection::All => SelectionPolicy::AllTags,
        TagSelection::Strongest => SelectionPolicy::StrongestSignal,
    }
}

/// Bind the push channel and start the coordinator
///
/// The reader is connected at the configured power right away, without
/// waiting for an operator request. `config` is validated first, so a
/// hand-built config gets the same checks as a loaded one.
pub async fn start<C: ReaderClient>(config: &TagLinkConfig, reader: C) -> ServerResult<RunningServer> {
    validate_config(config)?;
    let host = config
        .reader
        .host()
        .ok_or(ServerError::MissingReaderHost)?
        .to_string();

    let push = PushServer::bind(&config.server.listen_address(), config.server.subscriber_queue).await?;
    let local_addr = push.local_addr();

    let relay = match config.relay.endpoint() {
        Some(endpoint) => {
            info!("[RELAY] Relaying sightings to {}", endpoint);
            Some(HttpRelay::new(endpoint, config.relay.timeout())?)
        }
        None => {
            info!("[RELAY] No relay endpoint configured, relay disabled");
            None
        }
    };

    let normalizer = Normalizer::new(
        config.reader.chip_id_length,
        selection_policy(config.reader.selection),
    );
    let (bridge, ingest_rx) = IngestBridge::channel(normalizer, config.server.ingest_queue);
    let reader = ReaderLink::new(reader, bridge.into_callback());

    let target = ReaderTarget::new(
        host,
        config.reader.port,
        config.reader.antennas.clone(),
        config.reader.tx_power,
    );
    let coordinator = Coordinator::new(
        CoordinatorSettings::from_config(config),
        target,
        reader,
        ingest_rx,
        relay,
    );
    let handle = coordinator.handle();

    let coordinator = tokio::spawn(coordinator.run());
    let push = tokio::spawn(push.run(handle.clone()));

    Ok(RunningServer {
        local_addr,
        handle,
        coordinator,
        push,
    })
}

/// [`start`], wait for `shutdown_signal`, then shut down
pub async fn run<C, F>(config: &TagLinkConfig, reader: C, shutdown_signal: F) -> ServerResult<()>
where
    C: ReaderClient,
    F: Future<Output = ()>,
{
    let server = start(config, reader).await?;
    info!(
        "[WS-PUSH] Server running at ws://{}/ (Press Ctrl+C to stop)",
        server.local_addr()
    );
    shutdown_signal.await;
    info!("[COORD] Shutdown requested");
    server.shutdown().await
}
