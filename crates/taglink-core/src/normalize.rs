// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reading normalization
//!
//! Readers report the tag identifier under different keys depending on the
//! firmware and the client library, and sometimes as raw bytes. This module
//! maps one raw reading onto a canonical identifier string, derives the chip id
//! from its trailing characters, and extracts the optional telemetry fields.
//!
//! Identifier keys are checked in this order: `EPC-96`, `EPCData`, `EPC`.
//! Readings without a usable identifier are dropped; that is routine for
//! malformed vendor payloads and not an error.

use std::collections::HashMap;
use std::fmt::Write as _;

use tracing::debug;

use crate::record::TagFields;

/// Identifier keys, highest priority first
pub const IDENTIFIER_KEYS: &[&str] = &["EPC-96", "EPCData", "EPC"];

const ANTENNA_KEYS: &[&str] = &["AntennaID"];
const RSSI_KEYS: &[&str] = &["PeakRSSI", "PeakRssi", "Rssi"];
const FIRST_SEEN_KEYS: &[&str] = &["FirstSeenTimestampUTC", "FirstSeenTimestamp"];
const LAST_SEEN_KEYS: &[&str] = &["LastSeenTimestampUTC", "LastSeenTimestamp"];
const SEEN_COUNT_KEYS: &[&str] = &["TagSeenCount"];

/// One field value as delivered by the reader collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl RawValue {
    fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Int(v) => Some(*v),
            RawValue::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            RawValue::Text(s) => s.trim().parse().ok(),
            RawValue::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// Identifier text, or `None` when the value is empty or not identifier-like
    fn as_identifier(&self) -> Option<String> {
        match self {
            RawValue::Text(s) if !s.is_empty() => Some(s.clone()),
            RawValue::Bytes(b) if !b.is_empty() => Some(decode_identifier_bytes(b)),
            RawValue::Int(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(value: Vec<u8>) -> Self {
        RawValue::Bytes(value)
    }
}

impl From<&[u8]> for RawValue {
    fn from(value: &[u8]) -> Self {
        RawValue::Bytes(value.to_vec())
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

/// One raw reading: field name -> value
pub type RawReading = HashMap<String, RawValue>;

/// UTF-8 text when valid, lowercase hex otherwise
pub fn decode_identifier_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let mut hex = String::with_capacity(bytes.len() * 2);
            for byte in bytes {
                let _ = write!(hex, "{:02x}", byte);
            }
            hex
        }
    }
}

/// How a batch is reduced before it reaches the live table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Keep every recognised reading
    #[default]
    AllTags,
    /// Keep only the strongest-signal reading; drop the batch if no reading has a
    /// non-zero signal
    StrongestSignal,
}

/// Canonical result of normalizing one reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedReading {
    pub chip_id: String,
    pub fields: TagFields,
}

/// Stateless reading normalizer
#[derive(Debug, Clone)]
pub struct Normalizer {
    chip_id_length: usize,
    policy: SelectionPolicy,
}

impl Normalizer {
    pub fn new(chip_id_length: usize, policy: SelectionPolicy) -> Self {
        Self {
            chip_id_length: chip_id_length.max(1),
            policy,
        }
    }

    pub fn chip_id_length(&self) -> usize {
        self.chip_id_length
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Chip id = the last `chip_id_length` characters of the identifier
    ///
    /// Identifiers shorter than the chip id length are rejected so every chip id
    /// has the same length.
    pub fn chip_id_of(&self, identifier: &str) -> Option<String> {
        let count = identifier.chars().count();
        if count < self.chip_id_length {
            return None;
        }
        Some(identifier.chars().skip(count - self.chip_id_length).collect())
    }

    /// Normalize one reading; `None` means "drop it"
    pub fn normalize(&self, reading: &RawReading) -> Option<NormalizedReading> {
        let Some(epc) = IDENTIFIER_KEYS
            .iter()
            .find_map(|key| reading.get(*key).and_then(RawValue::as_identifier))
        else {
            debug!("Dropping reading without identifier field");
            return None;
        };

        let Some(chip_id) = self.chip_id_of(&epc) else {
            debug!(
                "Dropping reading with identifier {:?} shorter than {} characters",
                epc, self.chip_id_length
            );
            return None;
        };

        let fields = TagFields {
            epc,
            antenna_id: first_int(reading, ANTENNA_KEYS).and_then(|v| u16::try_from(v).ok()),
            peak_rssi: first_int(reading, RSSI_KEYS).and_then(|v| i32::try_from(v).ok()),
            first_seen_timestamp: first_int(reading, FIRST_SEEN_KEYS)
                .and_then(|v| u64::try_from(v).ok()),
            last_seen_timestamp: first_int(reading, LAST_SEEN_KEYS)
                .and_then(|v| u64::try_from(v).ok()),
            tag_seen_count: first_int(reading, SEEN_COUNT_KEYS).and_then(|v| u32::try_from(v).ok()),
        };

        Some(NormalizedReading { chip_id, fields })
    }

    /// Normalize a whole delivery, applying the selection policy
    pub fn normalize_batch(&self, batch: &[RawReading]) -> Vec<NormalizedReading> {
        let readings = batch.iter().filter_map(|r| self.normalize(r));
        match self.policy {
            SelectionPolicy::AllTags => readings.collect(),
            SelectionPolicy::StrongestSignal => readings
                .filter(|r| matches!(r.fields.peak_rssi, Some(rssi) if rssi != 0))
                .max_by_key(|r| r.fields.peak_rssi)
                .into_iter()
                .collect(),
        }
    }
}

fn first_int(reading: &RawReading, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .filter_map(|key| reading.get(*key))
        .find_map(RawValue::as_i64)
}
