// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # taglink-observability
//!
//! Logging setup shared by every taglink binary, with per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: JSON log files with daily rotation and run-folder retention

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known taglink crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "taglink-config",
    "taglink-core",
    "taglink-discovery",
    "taglink-server",
];
