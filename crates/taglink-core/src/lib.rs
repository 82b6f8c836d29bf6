// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # taglink-core
//!
//! Runtime-agnostic state for the tag-ingestion coordinator.
//!
//! Nothing in this crate sleeps, spawns or performs I/O. Every time-dependent
//! operation takes `now: Instant` from the caller, so the runtime in
//! `taglink-server` owns the clock and tests can drive it deterministically.
//!
//! - [`normalize`]: raw reader readings -> canonical `(chip_id, fields)`
//! - [`store`]: live table keyed by chip id, with expiry
//! - [`notifier`]: subscriber set with per-chip throttled snapshot broadcast
//! - [`reconfig`]: debounced, serialized transmit-power state machine
//! - [`relay`]: per-chip relay rate limiting
//! - [`wire`]: push-channel JSON schema

pub mod error;
pub mod normalize;
pub mod notifier;
pub mod reconfig;
pub mod record;
pub mod relay;
pub mod store;
pub mod wire;

pub use error::{CoreError, CoreResult};
pub use normalize::{NormalizedReading, Normalizer, RawReading, RawValue, SelectionPolicy};
pub use notifier::{Frame, LiveView, Notifier, SinkError, SubscriberId, SubscriberSink};
pub use reconfig::{ReaderTarget, ReconfigAction, ReconfigController, ReconfigPhase};
pub use record::{TagFields, TagRecord};
pub use relay::RelayThrottle;
pub use store::TagStore;
pub use wire::{
    clamp_power, parse_client_message, ApiSent, ClientRequest, ServerMessage, StateMessage,
    WireTag, MAX_ANTENNA_POWER,
};
