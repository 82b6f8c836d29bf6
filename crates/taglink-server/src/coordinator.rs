// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Single-task coordinator
//!
//! Owns the live table, the subscriber set, the reconfiguration state machine
//! and the reader link. Everything reaches it as a message, so none of that
//! state needs a lock:
//!
//! - tag batches from the ingest bridge (bounded queue)
//! - control events from push connections, reconnect workers and relay tasks
//! - the expiry sweep tick
//! - the debounce timer
//!
//! Blocking work (reader reconnects) and outbound calls (relay) run on other
//! tasks and report back through [`CoordinatorHandle`].

use std::time::{Duration, Instant};

use taglink_config::TagLinkConfig;
use taglink_core::{
    LiveView, Notifier, ReaderTarget, ReconfigAction, ReconfigController, ReconfigPhase,
    RelayThrottle, SubscriberId, TagStore,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::bridge::TagBatch;
use crate::error::{ServerError, ServerResult};
use crate::push::ChannelSink;
use crate::reader::{ReaderClient, ReaderError, ReaderLink, ReaderSettings};
use crate::relay::HttpRelay;
use crate::timer::DebounceTimer;

/// Messages the coordinator accepts besides tag batches
#[derive(Debug)]
pub enum ControlEvent {
    SubscriberJoined { id: SubscriberId, sink: ChannelSink },
    SubscriberLeft { id: SubscriberId },
    PowerRequested { power: u8 },
    ReconnectFinished { wanted: u8, success: bool },
    RelayConfirmed { chip_id: String, timestamp: i64 },
    Status { reply: oneshot::Sender<CoordinatorStatus> },
    Shutdown,
}

/// Point-in-time view of coordinator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorStatus {
    pub tag_count: usize,
    pub subscriber_count: usize,
    pub current_power: u8,
    pub desired_power: u8,
    pub phase: ReconfigPhase,
}

/// Cloneable sender side of the coordinator's control queue
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<ControlEvent>,
}

impl CoordinatorHandle {
    /// `false` once the coordinator has stopped
    pub fn send(&self, event: ControlEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn subscriber_joined(&self, id: SubscriberId, sink: ChannelSink) -> bool {
        self.send(ControlEvent::SubscriberJoined { id, sink })
    }

    pub fn subscriber_left(&self, id: SubscriberId) -> bool {
        self.send(ControlEvent::SubscriberLeft { id })
    }

    pub fn request_power(&self, power: u8) -> bool {
        self.send(ControlEvent::PowerRequested { power })
    }

    pub fn relay_confirmed(&self, chip_id: String, timestamp: i64) -> bool {
        self.send(ControlEvent::RelayConfirmed { chip_id, timestamp })
    }

    pub fn shutdown(&self) -> bool {
        self.send(ControlEvent::Shutdown)
    }

    pub async fn status(&self) -> ServerResult<CoordinatorStatus> {
        let (reply, rx) = oneshot::channel();
        if !self.send(ControlEvent::Status { reply }) {
            return Err(ServerError::CoordinatorStopped);
        }
        rx.await.map_err(|_| ServerError::CoordinatorStopped)
    }
}

/// Timing windows used by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub notify_suppress: Duration,
    pub expire: Duration,
    pub sweep_interval: Duration,
    pub debounce: Duration,
    pub relay_interval: Duration,
}

impl CoordinatorSettings {
    pub fn from_config(config: &TagLinkConfig) -> Self {
        Self {
            notify_suppress: config.timing.notify_suppress(),
            expire: config.timing.expire(),
            sweep_interval: config.timing.sweep_interval(),
            debounce: config.timing.debounce(),
            relay_interval: config.relay.interval(),
        }
    }
}

/// Coordinator clock; follows tokio's clock so paused-time tests stay consistent
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

pub struct Coordinator<C> {
    store: TagStore,
    notifier: Notifier<ChannelSink>,
    reconfig: ReconfigController,
    reader: ReaderLink<C>,
    relay: Option<HttpRelay>,
    relay_throttle: RelayThrottle,
    timer: DebounceTimer,
    expire: Duration,
    sweep_interval: Duration,
    ingest_rx: mpsc::Receiver<TagBatch>,
    control_rx: mpsc::UnboundedReceiver<ControlEvent>,
    handle: CoordinatorHandle,
}

impl<C: ReaderClient> Coordinator<C> {
    pub fn new(
        settings: CoordinatorSettings,
        target: ReaderTarget,
        reader: ReaderLink<C>,
        ingest_rx: mpsc::Receiver<TagBatch>,
        relay: Option<HttpRelay>,
    ) -> Self {
        let (tx, control_rx) = mpsc::unbounded_channel();
        Self {
            store: TagStore::new(),
            notifier: Notifier::new(settings.notify_suppress),
            reconfig: ReconfigController::new(target, settings.debounce),
            reader,
            relay,
            relay_throttle: RelayThrottle::new(settings.relay_interval),
            timer: DebounceTimer::new(),
            expire: settings.expire,
            sweep_interval: settings.sweep_interval,
            ingest_rx,
            control_rx,
            handle: CoordinatorHandle { tx },
        }
    }

    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    /// Run until [`ControlEvent::Shutdown`], then disconnect the reader
    ///
    /// A reconnect still queued at that point is refused by the closed link.
    pub async fn run(mut self) {
        let target = self.reconfig.target();
        info!(
            "[COORD] Starting for reader {}:{} antennas {:?} at tx_power={}",
            target.host, target.port, target.antennas, target.current_power
        );

        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let startup = self.reconfig.start();
        self.execute(startup);

        loop {
            tokio::select! {
                Some(batch) = self.ingest_rx.recv() => self.on_batch(batch),
                event = self.control_rx.recv() => match event {
                    Some(ControlEvent::Shutdown) | None => break,
                    Some(event) => self.on_control(event),
                },
                _ = sweep.tick() => self.sweep(),
                _ = self.timer.fired() => {
                    let actions = self.reconfig.timer_fired();
                    self.execute(actions);
                }
            }
        }

        self.timer.cancel();
        if let Err(e) = self.reader.shutdown().await {
            warn!("[COORD] Reader shutdown failed: {}", e);
        }
        info!("[COORD] Stopped");
    }

    fn on_batch(&mut self, batch: TagBatch) {
        let now = now();
        let mut changed = Vec::with_capacity(batch.readings.len());
        for reading in batch.readings {
            self.store.upsert(&reading.chip_id, reading.fields, now);
            changed.push(reading.chip_id);
        }

        let view = LiveView {
            store: &self.store,
            antenna_power: self.reconfig.current_power(),
        };
        if self.notifier.on_store_changed(&changed, now, view) {
            debug!(
                "[COORD] Broadcast {} live tags to {} subscribers",
                self.store.len(),
                self.notifier.subscriber_count()
            );
        }

        if let Some(relay) = &self.relay {
            for chip_id in &changed {
                if self.relay_throttle.should_relay(chip_id, now) {
                    relay.spawn(chip_id.clone(), self.handle.clone());
                }
            }
        }
    }

    fn sweep(&mut self) {
        let now = now();
        self.relay_throttle.prune(now);
        let Some(cutoff) = now.checked_sub(self.expire) else {
            return;
        };
        let evicted: Vec<String> = self
            .store
            .evict_older_than(cutoff)
            .iter()
            .map(|record| record.chip_id().to_string())
            .collect();
        if evicted.is_empty() {
            return;
        }
        info!("[COORD] Expired {} tags: {:?}", evicted.len(), evicted);
        let view = LiveView {
            store: &self.store,
            antenna_power: self.reconfig.current_power(),
        };
        self.notifier.on_evicted(&evicted, view);
    }

    fn on_control(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::SubscriberJoined { id, sink } => {
                if !self.notifier.add_subscriber(id, sink) {
                    warn!("[COORD] Subscriber {} already registered", id);
                    return;
                }
                let view = LiveView {
                    store: &self.store,
                    antenna_power: self.reconfig.current_power(),
                };
                self.notifier.send_state_to(id, view);
                info!(
                    "[COORD] Subscriber {} joined (total: {})",
                    id,
                    self.notifier.subscriber_count()
                );
            }
            ControlEvent::SubscriberLeft { id } => {
                if self.notifier.remove_subscriber(id) {
                    info!(
                        "[COORD] Subscriber {} left (total: {})",
                        id,
                        self.notifier.subscriber_count()
                    );
                }
            }
            ControlEvent::PowerRequested { power } => {
                let actions = self.reconfig.request_power(power);
                self.execute(actions);
            }
            ControlEvent::ReconnectFinished { wanted, success } => {
                let actions = self.reconfig.reconnect_finished(wanted, success);
                self.execute(actions);
            }
            ControlEvent::RelayConfirmed { chip_id, timestamp } => {
                self.notifier.broadcast_relay_confirmation(&chip_id, timestamp);
            }
            ControlEvent::Status { reply } => {
                let _ = reply.send(CoordinatorStatus {
                    tag_count: self.store.len(),
                    subscriber_count: self.notifier.subscriber_count(),
                    current_power: self.reconfig.current_power(),
                    desired_power: self.reconfig.desired_power(),
                    phase: self.reconfig.phase(),
                });
            }
            ControlEvent::Shutdown => {}
        }
    }

    fn execute(&mut self, actions: Vec<ReconfigAction>) {
        for action in actions {
            match action {
                ReconfigAction::ArmTimer(delay) => self.timer.arm(delay),
                ReconfigAction::StartReconnect { power } => self.start_reconnect(power),
                ReconfigAction::AnnouncePower { power } => {
                    let view = LiveView {
                        store: &self.store,
                        antenna_power: power,
                    };
                    let reached = self.notifier.broadcast_state(view);
                    debug!("[COORD] Announced tx_power={} to {} subscribers", power, reached);
                }
            }
        }
    }

    fn start_reconnect(&self, power: u8) {
        let target = self.reconfig.target();
        info!("[COORD] Reconfiguring reader to tx_power={}", power);
        let reconnect = self.reader.reconnect(
            target.host.clone(),
            target.port,
            ReaderSettings::new(target.antennas.clone(), power),
        );
        let handle = self.handle.clone();
        tokio::spawn(async move {
            let success = match reconnect.await {
                Ok(()) => true,
                Err(ReaderError::Closed) => {
                    debug!("[COORD] Skipped tx_power={} reconnect after shutdown", power);
                    false
                }
                Err(e) => {
                    error!("[COORD] Reconfigure to tx_power={} failed: {}", power, e);
                    false
                }
            };
            handle.send(ControlEvent::ReconnectFinished {
                wanted: power,
                success,
            });
        });
    }
}
