// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Live tag record and the partial update merged into it

use std::time::Instant;

/// Canonical fields extracted from one reading
///
/// `epc` is always present; every other field may be missing from a given
/// vendor payload and is then left untouched on merge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagFields {
    pub epc: String,
    pub antenna_id: Option<u16>,
    pub peak_rssi: Option<i32>,
    pub first_seen_timestamp: Option<u64>,
    pub last_seen_timestamp: Option<u64>,
    pub tag_seen_count: Option<u32>,
}

/// Most recent merged state of one chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    chip_id: String,
    pub epc: String,
    pub antenna_id: Option<u16>,
    pub peak_rssi: Option<i32>,
    pub first_seen_timestamp: Option<u64>,
    pub last_seen_timestamp: Option<u64>,
    pub tag_seen_count: Option<u32>,
    /// Coordinator clock, not reader clock
    pub last_seen_local: Instant,
}

impl TagRecord {
    pub(crate) fn new(chip_id: &str, fields: TagFields, now: Instant) -> Self {
        Self {
            chip_id: chip_id.to_string(),
            epc: fields.epc,
            antenna_id: fields.antenna_id,
            peak_rssi: fields.peak_rssi,
            first_seen_timestamp: fields.first_seen_timestamp,
            last_seen_timestamp: fields.last_seen_timestamp,
            tag_seen_count: fields.tag_seen_count,
            last_seen_local: now,
        }
    }

    pub fn chip_id(&self) -> &str {
        &self.chip_id
    }

    /// Overlay present fields; absent ones keep their previous value
    pub(crate) fn merge(&mut self, fields: TagFields) {
        self.epc = fields.epc;
        if fields.antenna_id.is_some() {
            self.antenna_id = fields.antenna_id;
        }
        if fields.peak_rssi.is_some() {
            self.peak_rssi = fields.peak_rssi;
        }
        if fields.first_seen_timestamp.is_some() {
            self.first_seen_timestamp = fields.first_seen_timestamp;
        }
        if fields.last_seen_timestamp.is_some() {
            self.last_seen_timestamp = fields.last_seen_timestamp;
        }
        if fields.tag_seen_count.is_some() {
            self.tag_seen_count = fields.tag_seen_count;
        }
    }
}
