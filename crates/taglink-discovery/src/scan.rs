// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bounded concurrent subnet scan

use std::net::Ipv4Addr;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::probe::Prober;
use crate::subnet::Ipv4Subnet;
use crate::DiscoveryResult;

/// Probe every address with at most `pool_size` probes in flight
///
/// Results come back in completion order, not address order.
pub async fn scan_hosts<I>(prober: &Prober, hosts: I, pool_size: usize) -> Vec<Ipv4Addr>
where
    I: IntoIterator<Item = Ipv4Addr>,
{
    stream::iter(hosts)
        .map(|address| async move { prober.probe(address).await.then_some(address) })
        .buffer_unordered(pool_size.max(1))
        .filter_map(|found| async move {
            if let Some(address) = found {
                info!("[DISCOVERY] Reader candidate at {}", address);
            }
            found
        })
        .collect()
        .await
}

/// Probe every host address of `subnet`
pub async fn scan(prober: &Prober, subnet: &Ipv4Subnet, pool_size: usize) -> Vec<Ipv4Addr> {
    info!(
        "[DISCOVERY] Scanning {} ({} hosts, port {}, {} concurrent probes)",
        subnet,
        subnet.host_count(),
        prober.port,
        pool_size.max(1)
    );
    scan_hosts(prober, subnet.hosts(), pool_size).await
}

/// Detect, scan, and retry every `retry_interval` until a reader answers
///
/// `subnet_source` is consulted on every attempt so interface changes between
/// attempts are picked up. Returns the first candidate found.
pub async fn discover_until_found<F>(
    mut subnet_source: F,
    prober: &Prober,
    pool_size: usize,
    retry_interval: Duration,
) -> Ipv4Addr
where
    F: FnMut() -> DiscoveryResult<Ipv4Subnet>,
{
    loop {
        match subnet_source() {
            Ok(subnet) => {
                let found = scan(prober, &subnet, pool_size).await;
                if let Some(first) = found.first() {
                    if found.len() > 1 {
                        info!(
                            "[DISCOVERY] {} candidates found, using {}",
                            found.len(),
                            first
                        );
                    }
                    return *first;
                }
                warn!(
                    "[DISCOVERY] No reader detected on {}, retrying in {:?}",
                    subnet, retry_interval
                );
            }
            Err(e) => {
                warn!(
                    "[DISCOVERY] Subnet detection failed: {}, retrying in {:?}",
                    e, retry_interval
                );
            }
        }
        tokio::time::sleep(retry_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_host_list() {
        let prober = Prober::new(1, Duration::from_millis(50));
        assert!(scan_hosts(&prober, Vec::new(), 4).await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_pool_size_still_scans() {
        let prober = Prober::new(1, Duration::from_millis(50));
        let found = scan_hosts(&prober, [Ipv4Addr::LOCALHOST], 0).await;
        assert!(found.is_empty());
    }
}
