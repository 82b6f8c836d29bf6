// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reader existence probe
//!
//! Connects to the reader port, sends a minimal capability request and treats
//! any non-empty reply as "something reader-like lives here". The reply is not
//! parsed.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

/// LLRP `GET_READER_CAPABILITIES` header with no body (version 1, length 10, id 0)
pub const GET_READER_CAPABILITIES: [u8; 10] = [0x01, 0x00, 0x00, 0x0a, 0, 0, 0, 0, 0, 0];

/// Default LLRP port
pub const DEFAULT_PROBE_PORT: u16 = 5084;

#[derive(Debug, Clone)]
pub struct Prober {
    pub port: u16,
    pub timeout: Duration,
    pub payload: Vec<u8>,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_PORT, Duration::from_secs(1))
    }
}

impl Prober {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            port,
            timeout,
            payload: GET_READER_CAPABILITIES.to_vec(),
        }
    }

    /// `true` if `address` answered within the timeout
    ///
    /// Refused connections, timeouts and empty replies all count as "no".
    pub async fn probe(&self, address: Ipv4Addr) -> bool {
        let target = SocketAddr::from((address, self.port));
        match tokio::time::timeout(self.timeout, self.exchange(target)).await {
            Ok(Ok(received)) => received > 0,
            Ok(Err(e)) => {
                trace!("[DISCOVERY] Probe {} failed: {}", target, e);
                false
            }
            Err(_) => {
                trace!("[DISCOVERY] Probe {} timed out", target);
                false
            }
        }
    }

    async fn exchange(&self, target: SocketAddr) -> std::io::Result<usize> {
        let mut stream = TcpStream::connect(target).await?;
        stream.write_all(&self.payload).await?;
        let mut reply = [0u8; 4096];
        stream.read(&mut reply).await
    }
}
