// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-chip relay rate limiting
//!
//! The mark is taken when the relay is *issued*, so slow or overlapping calls
//! cannot produce a second relay for the same chip inside the window.

use std::time::{Duration, Instant};

use ahash::AHashMap;

#[derive(Debug)]
pub struct RelayThrottle {
    interval: Duration,
    last_relayed: AHashMap<String, Instant>,
}

impl RelayThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_relayed: AHashMap::new(),
        }
    }

    /// `true` (and the chip is marked) if the chip may be relayed now
    pub fn should_relay(&mut self, chip_id: &str, now: Instant) -> bool {
        if let Some(last) = self.last_relayed.get(chip_id) {
            if now.saturating_duration_since(*last) < self.interval {
                return false;
            }
        }
        self.last_relayed.insert(chip_id.to_string(), now);
        true
    }

    /// Forget marks whose window has passed; returns how many were dropped
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.last_relayed.len();
        let interval = self.interval;
        self.last_relayed
            .retain(|_, last| now.saturating_duration_since(*last) < interval);
        before - self.last_relayed.len()
    }

    pub fn tracked(&self) -> usize {
        self.last_relayed.len()
    }
}
