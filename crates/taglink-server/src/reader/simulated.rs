// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synthetic reader for running without hardware
//!
//! Emits one tag report per interval from a dedicated thread, the same way a
//! real client delivers reports. Higher transmit power makes more of the tag
//! population visible.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use taglink_core::{RawReading, RawValue, MAX_ANTENNA_POWER};
use tracing::{debug, info};

use super::{ReaderClient, ReaderError, ReaderResult, ReaderSettings, TagReportCallback};

struct Inventory {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

pub struct SimulatedReader {
    population: usize,
    interval: Duration,
    callback: Option<TagReportCallback>,
    inventory: Option<Inventory>,
}

impl Default for SimulatedReader {
    fn default() -> Self {
        Self::new(12, Duration::from_millis(500))
    }
}

impl SimulatedReader {
    pub fn new(population: usize, interval: Duration) -> Self {
        Self {
            population,
            interval,
            callback: None,
            inventory: None,
        }
    }

    /// Tags in range at `tx_power` (0 = reader maximum)
    pub fn visible_tags(&self, tx_power: u8) -> usize {
        if tx_power == 0 || tx_power >= MAX_ANTENNA_POWER {
            return self.population;
        }
        let scaled = self.population * usize::from(tx_power);
        scaled.div_ceil(usize::from(MAX_ANTENNA_POWER))
    }
}

/// One report for tags `0..visible`
fn build_report(visible: usize, antennas: &[u16], tick: u64) -> Vec<RawReading> {
    let now_us = chrono::Utc::now().timestamp_micros();
    (0..visible)
        .map(|index| {
            let antenna = antennas.get(index % antennas.len().max(1)).copied().unwrap_or(1);
            let rssi = -35 - ((tick as i64 + index as i64 * 7) % 30);
            let mut reading = RawReading::new();
            reading.insert(
                "EPC-96".to_string(),
                RawValue::Text(format!("3008{:020X}", index + 1)),
            );
            reading.insert("AntennaID".to_string(), RawValue::Int(i64::from(antenna)));
            reading.insert("PeakRSSI".to_string(), RawValue::Int(rssi));
            reading.insert("FirstSeenTimestampUTC".to_string(), RawValue::Int(now_us));
            reading.insert("LastSeenTimestampUTC".to_string(), RawValue::Int(now_us));
            reading.insert("TagSeenCount".to_string(), RawValue::Int(1));
            reading
        })
        .collect()
}

impl ReaderClient for SimulatedReader {
    fn set_tag_report_callback(&mut self, callback: TagReportCallback) {
        self.callback = Some(callback);
    }

    fn connect(&mut self, host: &str, port: u16, settings: &ReaderSettings) -> ReaderResult<()> {
        if host.trim().is_empty() {
            return Err(ReaderError::ConnectFailed {
                host: host.to_string(),
                port,
                reason: "empty host".to_string(),
            });
        }
        if self.inventory.is_some() {
            self.disconnect()?;
        }

        let visible = self.visible_tags(settings.tx_power);
        let antennas = settings.antennas.clone();
        let interval = self.interval;
        let callback = self.callback.clone();
        let (stop, stop_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("taglink-sim-reader".to_string())
            .spawn(move || {
                let mut tick = 0u64;
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if let Some(callback) = &callback {
                        callback(build_report(visible, &antennas, tick));
                    }
                    tick = tick.wrapping_add(1);
                }
                debug!("[READER] Simulated inventory stopped");
            })
            .map_err(|e| ReaderError::ConnectFailed {
                host: host.to_string(),
                port,
                reason: e.to_string(),
            })?;

        info!(
            "[READER] Simulated reader {}:{} inventory started ({} of {} tags visible)",
            host, port, visible, self.population
        );
        self.inventory = Some(Inventory { stop, thread });
        Ok(())
    }

    fn disconnect(&mut self) -> ReaderResult<()> {
        let Some(inventory) = self.inventory.take() else {
            return Ok(());
        };
        let _ = inventory.stop.send(());
        inventory
            .thread
            .join()
            .map_err(|_| ReaderError::DisconnectFailed("inventory thread panicked".to_string()))
    }

    fn is_alive(&self) -> bool {
        self.inventory
            .as_ref()
            .is_some_and(|inventory| !inventory.thread.is_finished())
    }
}

impl Drop for SimulatedReader {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}
