// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Subscriber fan-out with per-chip throttling
//!
//! Subscribers always receive the complete live state, never a diff. A store
//! change only triggers a broadcast when at least one changed chip has not been
//! announced within the suppress window. A subscriber whose sink rejects a frame
//! is dropped from the set; other subscribers are unaffected.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use tracing::{debug, error};

use crate::store::TagStore;
use crate::wire::{ApiSent, ServerMessage, StateMessage};

/// Serialized frame shared by every subscriber of one broadcast
pub type Frame = Arc<str>;

/// Opaque subscriber handle id
pub type SubscriberId = u64;

/// Why a frame could not be handed to a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("subscriber queue full")]
    Full,
    #[error("subscriber connection closed")]
    Closed,
}

/// Outbound half of one push-channel connection
pub trait SubscriberSink {
    /// Hand a frame to the connection without blocking
    fn deliver(&self, frame: &Frame) -> Result<(), SinkError>;
}

/// Read-only view of what a state frame is built from
#[derive(Debug, Clone, Copy)]
pub struct LiveView<'a> {
    pub store: &'a TagStore,
    pub antenna_power: u8,
}

impl LiveView<'_> {
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::State(StateMessage::from_records(self.antenna_power, self.store.iter()))
    }
}

pub struct Notifier<S> {
    subscribers: BTreeMap<SubscriberId, S>,
    last_notified: AHashMap<String, Instant>,
    suppress_window: Duration,
}

impl<S: SubscriberSink> Notifier<S> {
    pub fn new(suppress_window: Duration) -> Self {
        Self {
            subscribers: BTreeMap::new(),
            last_notified: AHashMap::new(),
            suppress_window,
        }
    }

    /// Register a subscriber; returns `false` if the id was already present
    pub fn add_subscriber(&mut self, id: SubscriberId, sink: S) -> bool {
        if self.subscribers.contains_key(&id) {
            return false;
        }
        self.subscribers.insert(id, sink);
        true
    }

    /// Remove a subscriber; returns `false` if it was not present
    pub fn remove_subscriber(&mut self, id: SubscriberId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    /// Send the current state to one subscriber (connect greeting)
    pub fn send_state_to(&mut self, id: SubscriberId, view: LiveView<'_>) -> bool {
        let Some(frame) = encode(&view.to_message()) else {
            return false;
        };
        let Some(sink) = self.subscribers.get(&id) else {
            return false;
        };
        match sink.deliver(&frame) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping subscriber {} after failed greeting: {}", id, e);
                self.subscribers.remove(&id);
                false
            }
        }
    }

    /// Evaluate throttling for the chips touched by one store pass
    ///
    /// Marks each changed chip due if it was last announced at least
    /// `suppress_window` ago (or never), and broadcasts one snapshot if any chip
    /// is due. Returns whether a broadcast was issued.
    pub fn on_store_changed<T: AsRef<str>>(
        &mut self,
        changed: &[T],
        now: Instant,
        view: LiveView<'_>,
    ) -> bool {
        let mut any_due = false;
        for chip_id in changed {
            let chip_id = chip_id.as_ref();
            let due = match self.last_notified.get(chip_id) {
                Some(last) => now.saturating_duration_since(*last) >= self.suppress_window,
                None => true,
            };
            if due {
                self.last_notified.insert(chip_id.to_string(), now);
                any_due = true;
            }
        }

        if any_due {
            self.broadcast_state(view);
        }
        any_due
    }

    /// Announce removals; always broadcasts when anything was evicted
    ///
    /// Throttle marks of evicted chips are forgotten so a chip that reappears is
    /// announced immediately.
    pub fn on_evicted<T: AsRef<str>>(&mut self, evicted: &[T], view: LiveView<'_>) -> bool {
        if evicted.is_empty() {
            return false;
        }
        for chip_id in evicted {
            self.last_notified.remove(chip_id.as_ref());
        }
        self.broadcast_state(view);
        true
    }

    /// Unconditional state broadcast; returns the number of subscribers reached
    pub fn broadcast_state(&mut self, view: LiveView<'_>) -> usize {
        self.broadcast(&view.to_message())
    }

    pub fn broadcast_relay_confirmation(&mut self, chip_id: &str, timestamp: i64) -> usize {
        self.broadcast(&ServerMessage::RelayConfirmation {
            api_sent: ApiSent {
                chipid: chip_id.to_string(),
                timestamp,
            },
        })
    }

    /// Serialize once, deliver to everyone, drop subscribers that fail
    pub fn broadcast(&mut self, message: &ServerMessage) -> usize {
        let Some(frame) = encode(message) else {
            return 0;
        };

        let mut failed = Vec::new();
        for (id, sink) in &self.subscribers {
            if let Err(e) = sink.deliver(&frame) {
                debug!("Dropping subscriber {}: {}", id, e);
                failed.push(*id);
            }
        }
        for id in &failed {
            self.subscribers.remove(id);
        }
        self.subscribers.len()
    }
}

fn encode(message: &ServerMessage) -> Option<Frame> {
    match message.to_json() {
        Ok(json) => Some(Frame::from(json)),
        Err(e) => {
            error!("Failed to serialize push frame: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TagFields;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct RecordingSink {
        frames: Rc<RefCell<Vec<Frame>>>,
        fail_with: Option<SinkError>,
    }

    impl SubscriberSink for RecordingSink {
        fn deliver(&self, frame: &Frame) -> Result<(), SinkError> {
            if let Some(e) = self.fail_with {
                return Err(e);
            }
            self.frames.borrow_mut().push(frame.clone());
            Ok(())
        }
    }

    fn store_with(chip_ids: &[&str], now: Instant) -> TagStore {
        let mut store = TagStore::new();
        for chip_id in chip_ids {
            store.upsert(
                chip_id,
                TagFields {
                    epc: format!("E20000000000{}", chip_id),
                    ..Default::default()
                },
                now,
            );
        }
        store
    }

    #[test]
    fn test_add_remove_idempotent() {
        let mut notifier = Notifier::new(Duration::from_secs(30));
        assert!(notifier.add_subscriber(1, RecordingSink::default()));
        assert!(!notifier.add_subscriber(1, RecordingSink::default()));
        assert_eq!(notifier.subscriber_count(), 1);
        assert!(notifier.remove_subscriber(1));
        assert!(!notifier.remove_subscriber(1));
    }

    #[test]
    fn test_throttle_window() {
        let sink = RecordingSink::default();
        let mut notifier = Notifier::new(Duration::from_secs(30));
        notifier.add_subscriber(1, sink.clone());
        let t0 = Instant::now();
        let store = store_with(&["00001"], t0);
        let view = LiveView { store: &store, antenna_power: 30 };

        assert!(notifier.on_store_changed(&["00001"], t0, view));
        assert!(!notifier.on_store_changed(&["00001"], t0 + Duration::from_secs(10), view));
        assert!(notifier.on_store_changed(&["00001"], t0 + Duration::from_secs(30), view));
        assert_eq!(sink.frames.borrow().len(), 2);
    }

    #[test]
    fn test_one_due_chip_sends_full_snapshot() {
        let sink = RecordingSink::default();
        let mut notifier = Notifier::new(Duration::from_secs(30));
        notifier.add_subscriber(1, sink.clone());
        let t0 = Instant::now();
        let store = store_with(&["00001", "00002"], t0);
        let view = LiveView { store: &store, antenna_power: 20 };

        notifier.on_store_changed(&["00001"], t0, view);
        assert!(notifier.on_store_changed(&["00001", "00002"], t0 + Duration::from_secs(1), view));

        let frames = sink.frames.borrow();
        let last: serde_json::Value = serde_json::from_str(&frames[1]).unwrap();
        assert_eq!(last["tags"].as_array().unwrap().len(), 2);
        assert_eq!(last["antenna_power"], 20);
    }

    #[test]
    fn test_failed_sink_removed_without_affecting_others() {
        let good = RecordingSink::default();
        let bad = RecordingSink {
            fail_with: Some(SinkError::Closed),
            ..Default::default()
        };
        let mut notifier = Notifier::new(Duration::from_secs(30));
        notifier.add_subscriber(1, good.clone());
        notifier.add_subscriber(2, bad);

        let store = TagStore::new();
        let reached = notifier.broadcast_state(LiveView { store: &store, antenna_power: 30 });

        assert_eq!(reached, 1);
        assert!(!notifier.contains(2));
        assert_eq!(good.frames.borrow().len(), 1);
    }

    #[test]
    fn test_eviction_always_broadcasts_and_resets_throttle() {
        let sink = RecordingSink::default();
        let mut notifier = Notifier::new(Duration::from_secs(30));
        notifier.add_subscriber(1, sink.clone());
        let t0 = Instant::now();
        let store = store_with(&["00001"], t0);
        let view = LiveView { store: &store, antenna_power: 30 };

        notifier.on_store_changed(&["00001"], t0, view);
        assert!(notifier.on_evicted(&["00001"], view));
        assert!(!notifier.on_evicted::<&str>(&[], view));
        assert!(notifier.on_store_changed(&["00001"], t0 + Duration::from_secs(1), view));
        assert_eq!(sink.frames.borrow().len(), 3);
    }

    #[test]
    fn test_greeting_goes_to_one_subscriber() {
        let first = RecordingSink::default();
        let second = RecordingSink::default();
        let mut notifier = Notifier::new(Duration::from_secs(30));
        notifier.add_subscriber(1, first.clone());
        notifier.add_subscriber(2, second.clone());

        let store = TagStore::new();
        assert!(notifier.send_state_to(2, LiveView { store: &store, antenna_power: 7 }));
        assert!(!notifier.send_state_to(9, LiveView { store: &store, antenna_power: 7 }));
        assert!(first.frames.borrow().is_empty());
        assert_eq!(&*second.frames.borrow()[0], r#"{"antenna_power":7,"tags":[]}"#);
    }

    #[test]
    fn test_relay_confirmation_broadcast() {
        let sink = RecordingSink::default();
        let mut notifier = Notifier::new(Duration::from_secs(30));
        notifier.add_subscriber(1, sink.clone());
        notifier.broadcast_relay_confirmation("00009", 42);
        assert_eq!(
            &*sink.frames.borrow()[0],
            r#"{"api_sent":{"chipid":"00009","timestamp":42}}"#
        );
    }
}
