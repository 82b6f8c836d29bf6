// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Re-armable one-shot timer for the coordinator's select loop

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Trailing-edge debounce timer
///
/// `arm` replaces any pending deadline. `fired` resolves once the deadline
/// passes and never resolves while disarmed, so it can sit in a `select!`
/// branch permanently.
#[derive(Debug, Default)]
pub struct DebounceTimer {
    deadline: Option<Instant>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait for the armed deadline, then disarm
    ///
    /// Cancel-safe: dropping the future before it completes leaves the timer armed.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}
