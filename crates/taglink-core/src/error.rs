// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Client frame was not a JSON object
    #[error("Invalid client message: {0}")]
    InvalidMessage(String),

    /// `antenna_power` present but not an integer-like value
    #[error("Bad antenna_power value: {0}")]
    InvalidPower(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
