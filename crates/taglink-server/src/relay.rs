// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Outbound HTTP relay of chip sightings
//!
//! `POST <endpoint>` with `{"chipid": "..."}`. Fire-and-forget: failures are
//! logged and never retried. A 2xx JSON reply is reported back to the
//! coordinator as a relay confirmation.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::coordinator::CoordinatorHandle;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Relay request failed: {0}")]
    Transport(String),

    #[error("Relay endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Relay response is not valid JSON: {0}")]
    Decode(String),
}

pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    chipid: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpRelay {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRelay {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::ClientBuild(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post one chip id and return the decoded JSON reply
    pub async fn post(&self, chip_id: &str) -> RelayResult<serde_json::Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RelayRequest { chipid: chip_id })
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status(status.as_u16()));
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| RelayError::Decode(e.to_string()))
    }

    /// Post in the background; confirm to `coordinator` on success
    pub fn spawn(&self, chip_id: String, coordinator: CoordinatorHandle) {
        let relay = self.clone();
        tokio::spawn(async move {
            match relay.post(&chip_id).await {
                Ok(body) => {
                    info!("[RELAY] Sent tag {} -> {}", chip_id, body);
                    coordinator.relay_confirmed(chip_id, chrono::Utc::now().timestamp());
                }
                Err(RelayError::Status(code)) => {
                    warn!("[RELAY] Failed to send tag {}: HTTP {}", chip_id, code);
                }
                Err(e) => {
                    error!("[RELAY] Error posting tag {}: {}", chip_id, e);
                }
            }
        });
    }
}
