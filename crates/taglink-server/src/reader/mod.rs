// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reader collaborator seam
//!
//! The physical reader client is synchronous and delivers tag reports from its
//! own thread. [`ReaderLink`] owns the single client instance and serializes
//! every connect/disconnect sequence behind a mutex; the coordinator is the
//! only holder of the link. Once the link is shut down, later reconnects are
//! refused under the same lock.

pub mod simulated;

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use taglink_core::RawReading;
use thiserror::Error;
use tracing::{info, warn};

pub use simulated::SimulatedReader;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Failed to connect to reader at {host}:{port}: {reason}")]
    ConnectFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Reader disconnect failed: {0}")]
    DisconnectFailed(String),

    #[error("Reader worker failed: {0}")]
    Worker(String),

    #[error("Reader link is shut down")]
    Closed,
}

pub type ReaderResult<T> = Result<T, ReaderError>;

/// Invoked by the reader client, on its own thread, with each tag report
pub type TagReportCallback = Arc<dyn Fn(Vec<RawReading>) + Send + Sync>;

/// Which optional fields the reader includes in each tag report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagContentSelector {
    pub enable_antenna_id: bool,
    pub enable_peak_rssi: bool,
    pub enable_first_seen_timestamp: bool,
    pub enable_last_seen_timestamp: bool,
    pub enable_tag_seen_count: bool,
}

impl TagContentSelector {
    pub fn full() -> Self {
        Self {
            enable_antenna_id: true,
            enable_peak_rssi: true,
            enable_first_seen_timestamp: true,
            enable_last_seen_timestamp: true,
            enable_tag_seen_count: true,
        }
    }
}

/// Connection parameters handed to the reader client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderSettings {
    pub antennas: Vec<u16>,
    /// 0 = reader maximum
    pub tx_power: u8,
    pub start_inventory: bool,
    pub report_every_n_tags: u32,
    pub tag_content_selector: TagContentSelector,
}

impl ReaderSettings {
    pub fn new(antennas: Vec<u16>, tx_power: u8) -> Self {
        Self {
            antennas,
            tx_power,
            start_inventory: true,
            report_every_n_tags: 1,
            tag_content_selector: TagContentSelector::full(),
        }
    }
}

/// Blocking reader client
pub trait ReaderClient: Send + 'static {
    /// Install the report callback; applies to every later connection
    fn set_tag_report_callback(&mut self, callback: TagReportCallback);

    /// Connect and start inventory
    fn connect(&mut self, host: &str, port: u16, settings: &ReaderSettings) -> ReaderResult<()>;

    /// Stop inventory and close the connection
    fn disconnect(&mut self) -> ReaderResult<()>;

    fn is_alive(&self) -> bool;
}

struct LinkState<C> {
    client: C,
    closed: bool,
}

/// Exclusive owner of the reader client
pub struct ReaderLink<C> {
    state: Arc<Mutex<LinkState<C>>>,
}

impl<C: ReaderClient> ReaderLink<C> {
    pub fn new(mut client: C, callback: TagReportCallback) -> Self {
        client.set_tag_report_callback(callback);
        Self {
            state: Arc::new(Mutex::new(LinkState {
                client,
                closed: false,
            })),
        }
    }

    /// Disconnect any live connection, then connect with `settings`
    ///
    /// The blocking work runs on tokio's blocking pool; the returned future
    /// does not borrow the link so it can be spawned. Fails with
    /// [`ReaderError::Closed`] if [`shutdown`](Self::shutdown) got the lock first.
    pub fn reconnect(
        &self,
        host: String,
        port: u16,
        settings: ReaderSettings,
    ) -> impl Future<Output = ReaderResult<()>> + Send + 'static {
        let state = Arc::clone(&self.state);
        async move {
            tokio::task::spawn_blocking(move || -> ReaderResult<()> {
                let mut state = state.lock();
                if state.closed {
                    return Err(ReaderError::Closed);
                }
                let client = &mut state.client;
                if client.is_alive() {
                    if let Err(e) = client.disconnect() {
                        warn!("[READER] Ignoring disconnect failure before reconnect: {}", e);
                    }
                }
                client.connect(&host, port, &settings)?;
                info!(
                    "[READER] Connected @ {}:{} with tx_power={}",
                    host, port, settings.tx_power
                );
                Ok(())
            })
            .await
            .map_err(|e| ReaderError::Worker(e.to_string()))?
        }
    }

    /// Disconnect if connected and refuse every later reconnect
    pub async fn shutdown(&self) -> ReaderResult<()> {
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || -> ReaderResult<()> {
            let mut state = state.lock();
            state.closed = true;
            if state.client.is_alive() {
                state.client.disconnect()?;
                info!("[READER] Disconnected");
            }
            Ok(())
        })
        .await
        .map_err(|e| ReaderError::Worker(e.to_string()))?
    }

    pub fn is_alive(&self) -> bool {
        self.state.lock().client.is_alive()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingClient {
        connected: bool,
        connects: Arc<AtomicUsize>,
        disconnects: Arc<AtomicUsize>,
        refuse: bool,
    }

    impl ReaderClient for CountingClient {
        fn set_tag_report_callback(&mut self, _callback: TagReportCallback) {}

        fn connect(&mut self, host: &str, port: u16, _settings: &ReaderSettings) -> ReaderResult<()> {
            if self.refuse {
                return Err(ReaderError::ConnectFailed {
                    host: host.to_string(),
                    port,
                    reason: "refused".to_string(),
                });
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.connected = true;
            Ok(())
        }

        fn disconnect(&mut self) -> ReaderResult<()> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            self.connected = false;
            Ok(())
        }

        fn is_alive(&self) -> bool {
            self.connected
        }
    }

    #[test]
    fn test_settings_defaults() {
        let settings = ReaderSettings::new(vec![1, 2], 25);
        assert_eq!(settings.report_every_n_tags, 1);
        assert!(settings.start_inventory);
        assert_eq!(settings.tag_content_selector, TagContentSelector::full());
    }

    #[tokio::test]
    async fn test_reconnect_disconnects_live_client_first() {
        let client = CountingClient::default();
        let connects = client.connects.clone();
        let disconnects = client.disconnects.clone();
        let link = ReaderLink::new(client, Arc::new(|_: Vec<RawReading>| {}));

        link.reconnect("10.0.0.9".into(), 5084, ReaderSettings::new(vec![1], 30))
            .await
            .unwrap();
        assert_eq!(disconnects.load(Ordering::SeqCst), 0);

        link.reconnect("10.0.0.9".into(), 5084, ReaderSettings::new(vec![1], 10))
            .await
            .unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 2);
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert!(link.is_alive());

        link.shutdown().await.unwrap();
        assert!(!link.is_alive());
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces() {
        let client = CountingClient {
            refuse: true,
            ..Default::default()
        };
        let link = ReaderLink::new(client, Arc::new(|_: Vec<RawReading>| {}));
        let result = link
            .reconnect("10.0.0.9".into(), 5084, ReaderSettings::new(vec![1], 30))
            .await;
        assert!(matches!(result, Err(ReaderError::ConnectFailed { .. })));
        assert!(!link.is_alive());
    }

    #[tokio::test]
    async fn test_reconnect_polled_after_shutdown_is_refused() {
        let client = CountingClient::default();
        let connects = client.connects.clone();
        let link = ReaderLink::new(client, Arc::new(|_: Vec<RawReading>| {}));

        let pending = link.reconnect("10.0.0.9".into(), 5084, ReaderSettings::new(vec![1], 30));
        link.shutdown().await.unwrap();

        assert!(matches!(pending.await, Err(ReaderError::Closed)));
        assert_eq!(connects.load(Ordering::SeqCst), 0);
        assert!(link.is_closed());
        assert!(!link.is_alive());
    }
}
