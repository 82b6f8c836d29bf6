// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transmit-power reconfiguration state machine.
//!
//! Changing the reader's transmit power requires a full disconnect/connect. This
//! module decides *when* that happens; the runtime executes the returned
//! [`ReconfigAction`]s and feeds completions back in.
//!
//! Design constraints:
//! - No sleeps, no threads, no I/O
//! - At most one reconnect in flight
//! - Bursts of requests collapse to one apply of the last value (trailing debounce)
//! - Requests arriving mid-reconnect are reconciled once it completes
//!
//! ```text
//!            request            timer fired             finished
//!   Idle ──────────────▶ PendingApply ──────────▶ Applying ─────────▶ Idle
//!                         ▲    │ request                │ request
//!                         └────┘ (re-arm)               └─ record only
//! ```

use std::time::Duration;

use tracing::{debug, info, warn};

/// Reader endpoint plus applied/requested power
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderTarget {
    pub host: String,
    pub port: u16,
    pub antennas: Vec<u16>,
    /// Last power successfully applied to a live connection
    pub current_power: u8,
    /// Last power requested by an operator
    pub desired_power: u8,
}

impl ReaderTarget {
    pub fn new(host: impl Into<String>, port: u16, antennas: Vec<u16>, power: u8) -> Self {
        Self {
            host: host.into(),
            port,
            antennas,
            current_power: power,
            desired_power: power,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigPhase {
    Idle,
    /// Debounce timer armed
    PendingApply,
    /// Reconnect physically in flight
    Applying { wanted: u8 },
}

/// Side effects for the runtime to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigAction {
    /// (Re)arm the debounce timer, replacing any pending deadline
    ArmTimer(Duration),
    /// Disconnect any live reader connection, then connect at `power`
    StartReconnect { power: u8 },
    /// Tell subscribers the reader now runs at `power`
    AnnouncePower { power: u8 },
}

#[derive(Debug, Clone)]
pub struct ReconfigController {
    target: ReaderTarget,
    phase: ReconfigPhase,
    debounce: Duration,
}

impl ReconfigController {
    pub fn new(target: ReaderTarget, debounce: Duration) -> Self {
        Self {
            target,
            phase: ReconfigPhase::Idle,
            debounce,
        }
    }

    pub fn phase(&self) -> ReconfigPhase {
        self.phase
    }

    pub fn target(&self) -> &ReaderTarget {
        &self.target
    }

    pub fn current_power(&self) -> u8 {
        self.target.current_power
    }

    pub fn desired_power(&self) -> u8 {
        self.target.desired_power
    }

    pub fn is_applying(&self) -> bool {
        matches!(self.phase, ReconfigPhase::Applying { .. })
    }

    /// Initial connect at the configured power, skipping the debounce
    pub fn start(&mut self) -> Vec<ReconfigAction> {
        if self.phase != ReconfigPhase::Idle {
            return Vec::new();
        }
        self.begin_apply()
    }

    /// Operator asked for `power`
    pub fn request_power(&mut self, power: u8) -> Vec<ReconfigAction> {
        self.target.desired_power = power;
        match self.phase {
            ReconfigPhase::Applying { wanted } => {
                debug!(
                    "Power {} requested while applying {}; deferred until reconnect completes",
                    power, wanted
                );
                Vec::new()
            }
            ReconfigPhase::Idle | ReconfigPhase::PendingApply => {
                self.phase = ReconfigPhase::PendingApply;
                vec![ReconfigAction::ArmTimer(self.debounce)]
            }
        }
    }

    /// Debounce timer elapsed
    pub fn timer_fired(&mut self) -> Vec<ReconfigAction> {
        if self.phase != ReconfigPhase::PendingApply {
            debug!("Ignoring stale debounce timer in phase {:?}", self.phase);
            return Vec::new();
        }
        self.begin_apply()
    }

    /// Reconnect attempt for `wanted` completed
    pub fn reconnect_finished(&mut self, wanted: u8, success: bool) -> Vec<ReconfigAction> {
        if self.phase != (ReconfigPhase::Applying { wanted }) {
            warn!(
                "Ignoring reconnect completion for {} in phase {:?}",
                wanted, self.phase
            );
            return Vec::new();
        }

        self.phase = ReconfigPhase::Idle;
        let mut actions = Vec::new();
        if success {
            self.target.current_power = wanted;
            info!("Reader transmit power now {}", wanted);
            actions.push(ReconfigAction::AnnouncePower { power: wanted });
        } else {
            warn!(
                "Reconnect at power {} failed; staying at {}",
                wanted, self.target.current_power
            );
        }

        if self.target.desired_power != wanted {
            let desired = self.target.desired_power;
            actions.extend(self.request_power(desired));
        }
        actions
    }

    fn begin_apply(&mut self) -> Vec<ReconfigAction> {
        let wanted = self.target.desired_power;
        self.phase = ReconfigPhase::Applying { wanted };
        vec![ReconfigAction::StartReconnect { power: wanted }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(400);

    fn controller(power: u8) -> ReconfigController {
        ReconfigController::new(ReaderTarget::new("10.0.0.5", 5084, vec![1], power), DEBOUNCE)
    }

    #[test]
    fn test_start_applies_immediately() {
        let mut c = controller(30);
        assert_eq!(c.start(), vec![ReconfigAction::StartReconnect { power: 30 }]);
        assert!(c.is_applying());
        assert!(c.start().is_empty());
    }

    #[test]
    fn test_request_arms_timer() {
        let mut c = controller(30);
        assert_eq!(c.request_power(20), vec![ReconfigAction::ArmTimer(DEBOUNCE)]);
        assert_eq!(c.phase(), ReconfigPhase::PendingApply);
        assert_eq!(c.desired_power(), 20);
        assert_eq!(c.current_power(), 30);
    }

    #[test]
    fn test_burst_collapses_to_last_value() {
        let mut c = controller(30);
        c.request_power(30);
        c.request_power(20);
        assert_eq!(c.request_power(25), vec![ReconfigAction::ArmTimer(DEBOUNCE)]);

        assert_eq!(c.timer_fired(), vec![ReconfigAction::StartReconnect { power: 25 }]);
        assert_eq!(
            c.reconnect_finished(25, true),
            vec![ReconfigAction::AnnouncePower { power: 25 }]
        );
        assert_eq!(c.current_power(), 25);
        assert_eq!(c.phase(), ReconfigPhase::Idle);
    }

    #[test]
    fn test_request_during_apply_is_deferred_then_reapplied() {
        let mut c = controller(30);
        c.request_power(10);
        c.timer_fired();

        assert!(c.request_power(15).is_empty());
        assert!(c.request_power(18).is_empty());
        assert_eq!(c.phase(), ReconfigPhase::Applying { wanted: 10 });

        assert_eq!(
            c.reconnect_finished(10, true),
            vec![
                ReconfigAction::AnnouncePower { power: 10 },
                ReconfigAction::ArmTimer(DEBOUNCE)
            ]
        );
        assert_eq!(c.phase(), ReconfigPhase::PendingApply);
        assert_eq!(c.timer_fired(), vec![ReconfigAction::StartReconnect { power: 18 }]);
        assert_eq!(
            c.reconnect_finished(18, true),
            vec![ReconfigAction::AnnouncePower { power: 18 }]
        );
        assert_eq!(c.current_power(), 18);
    }

    #[test]
    fn test_failure_keeps_current_power() {
        let mut c = controller(30);
        c.request_power(5);
        c.timer_fired();
        assert!(c.reconnect_finished(5, false).is_empty());
        assert_eq!(c.current_power(), 30);
        assert_eq!(c.desired_power(), 5);
        assert_eq!(c.phase(), ReconfigPhase::Idle);
    }

    #[test]
    fn test_failure_with_newer_request_retries_newer_value() {
        let mut c = controller(30);
        c.request_power(5);
        c.timer_fired();
        c.request_power(6);
        assert_eq!(c.reconnect_finished(5, false), vec![ReconfigAction::ArmTimer(DEBOUNCE)]);
        assert_eq!(c.timer_fired(), vec![ReconfigAction::StartReconnect { power: 6 }]);
    }

    #[test]
    fn test_stale_events_ignored() {
        let mut c = controller(30);
        assert!(c.timer_fired().is_empty());
        assert!(c.reconnect_finished(30, true).is_empty());
        c.request_power(12);
        c.timer_fired();
        assert!(c.reconnect_finished(11, true).is_empty());
        assert!(c.is_applying());
    }
}
