// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Hand-off from the reader thread to the coordinator
//!
//! Normalization is pure, so it runs on the reader's thread. Everything that
//! touches the live table happens on the coordinator after the batch crosses
//! the queue. One reader delivery becomes exactly one [`TagBatch`].

use std::sync::Arc;

use taglink_core::{NormalizedReading, Normalizer, RawReading};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::reader::TagReportCallback;

/// Normalized readings from one reader delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagBatch {
    pub readings: Vec<NormalizedReading>,
}

#[derive(Clone)]
pub struct IngestBridge {
    normalizer: Normalizer,
    tx: mpsc::Sender<TagBatch>,
}

impl IngestBridge {
    /// Bridge plus the coordinator's receiving end, buffering `capacity` batches
    pub fn channel(normalizer: Normalizer, capacity: usize) -> (Self, mpsc::Receiver<TagBatch>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { normalizer, tx }, rx)
    }

    /// Normalize and enqueue one delivery without blocking
    ///
    /// Returns `true` if a batch was queued. A full queue drops the batch; the
    /// next delivery refreshes the same chips.
    pub fn deliver(&self, raw: Vec<RawReading>) -> bool {
        if raw.is_empty() {
            return false;
        }
        let readings = self.normalizer.normalize_batch(&raw);
        if readings.is_empty() {
            debug!("[READER] No usable readings in report of {}", raw.len());
            return false;
        }

        match self.tx.try_send(TagBatch { readings }) {
            Ok(()) => true,
            Err(TrySendError::Full(batch)) => {
                warn!(
                    "[READER] Ingest queue full, dropping batch of {} readings",
                    batch.readings.len()
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("[READER] Coordinator gone, dropping batch");
                false
            }
        }
    }

    /// Callback suitable for [`crate::reader::ReaderClient::set_tag_report_callback`]
    pub fn into_callback(self) -> TagReportCallback {
        Arc::new(move |raw: Vec<RawReading>| {
            self.deliver(raw);
        })
    }
}
