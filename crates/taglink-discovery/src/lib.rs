// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # taglink-discovery
//!
//! Finds RFID readers on the local network.
//!
//! The host's own private IPv4 address and prefix give the subnet to search;
//! every host address in it is probed concurrently with a cheap TCP existence
//! check against the reader port. Discovery is stateless: an empty result is
//! not an error, and [`discover_until_found`] is the caller-side retry loop.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod probe;
pub mod scan;
pub mod subnet;

pub use probe::{Prober, GET_READER_CAPABILITIES};
pub use scan::{discover_until_found, scan, scan_hosts};
pub use subnet::{
    detect_lan_subnet, is_private_lan_address, parse_ip_addr_output, select_lan_subnet, Ipv4Subnet,
};

/// Discovery error types
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Failed to run interface query: {0}")]
    CommandFailed(String),

    #[error("No private LAN IPv4 address found")]
    NoLanAddress,

    #[error("Invalid subnet: {0}")]
    InvalidSubnet(String),
}

/// Result type for discovery operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
