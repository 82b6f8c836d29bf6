// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime error types

use thiserror::Error;

use crate::reader::ReaderError;
use crate::relay::RelayError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind push channel on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No reader host configured")]
    MissingReaderHost,

    #[error("Coordinator is no longer running")]
    CoordinatorStopped,

    #[error("Coordinator task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] taglink_config::ConfigError),

    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),
}

pub type ServerResult<T> = Result<T, ServerError>;
