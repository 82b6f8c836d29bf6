// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Push-channel JSON schema
//!
//! Server -> client:
//! - `{"antenna_power": 30, "tags": [...]}` on connect and on every change
//! - `{"api_sent": {"chipid": "00001", "timestamp": 1700000000}}` after a relay
//!
//! Client -> server:
//! - `{"antenna_power": 20}` (clamped to `0..=30`)

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::record::TagRecord;

/// Highest transmit power an operator can request
pub const MAX_ANTENNA_POWER: u8 = 30;

/// Wire form of one live tag (no server-only bookkeeping)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTag {
    pub chipid: String,
    pub epc: String,
    #[serde(rename = "antennaId")]
    pub antenna_id: Option<u16>,
    #[serde(rename = "peakRssi")]
    pub peak_rssi: Option<i32>,
    #[serde(rename = "firstSeenTimestamp")]
    pub first_seen_timestamp: Option<u64>,
    #[serde(rename = "lastSeenTimestamp")]
    pub last_seen_timestamp: Option<u64>,
    #[serde(rename = "tagSeenCount")]
    pub tag_seen_count: Option<u32>,
}

impl From<&TagRecord> for WireTag {
    fn from(record: &TagRecord) -> Self {
        Self {
            chipid: record.chip_id().to_string(),
            epc: record.epc.clone(),
            antenna_id: record.antenna_id,
            peak_rssi: record.peak_rssi,
            first_seen_timestamp: record.first_seen_timestamp,
            last_seen_timestamp: record.last_seen_timestamp,
            tag_seen_count: record.tag_seen_count,
        }
    }
}

/// Full live state: current power plus every tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMessage {
    pub antenna_power: u8,
    pub tags: Vec<WireTag>,
}

impl StateMessage {
    pub fn from_records<'a>(
        antenna_power: u8,
        records: impl IntoIterator<Item = &'a TagRecord>,
    ) -> Self {
        Self {
            antenna_power,
            tags: records.into_iter().map(WireTag::from).collect(),
        }
    }
}

/// Relay confirmation payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSent {
    pub chipid: String,
    pub timestamp: i64,
}

/// Any server -> client frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    State(StateMessage),
    RelayConfirmation { api_sent: ApiSent },
}

impl ServerMessage {
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Operator request decoded from a client frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRequest {
    SetAntennaPower(u8),
}

/// Clamp an arbitrary requested power onto `0..=MAX_ANTENNA_POWER`
pub fn clamp_power(value: i64) -> u8 {
    value.clamp(0, MAX_ANTENNA_POWER as i64) as u8
}

/// Decode one client text frame
///
/// Returns `Ok(None)` for well-formed frames that carry no recognised request.
/// `antenna_power` accepts integers, floats (truncated) and numeric strings.
pub fn parse_client_message(text: &str) -> CoreResult<Option<ClientRequest>> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| CoreError::InvalidMessage(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(CoreError::InvalidMessage("expected a JSON object".to_string()));
    };

    let Some(power) = map.get("antenna_power") else {
        return Ok(None);
    };

    let requested = match power {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match requested {
        Some(v) => Ok(Some(ClientRequest::SetAntennaPower(clamp_power(v)))),
        None => Err(CoreError::InvalidPower(power.to_string())),
    }
}
