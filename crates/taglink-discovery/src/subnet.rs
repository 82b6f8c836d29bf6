// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! IPv4 subnet handling and LAN interface detection

use std::fmt;
use std::net::Ipv4Addr;
use std::process::Command;
use std::str::FromStr;

use tracing::{debug, info};

use crate::{DiscoveryError, DiscoveryResult};

/// An IPv4 network, always stored with host bits cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Subnet {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Subnet {
    /// Build the subnet containing `address`; host bits are masked off
    pub fn new(address: Ipv4Addr, prefix: u8) -> DiscoveryResult<Self> {
        if prefix > 32 {
            return Err(DiscoveryError::InvalidSubnet(format!(
                "prefix /{} out of range",
                prefix
            )));
        }
        let network = Ipv4Addr::from(u32::from(address) & mask(prefix));
        Ok(Self { network, prefix })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !mask(self.prefix))
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        u32::from(address) & mask(self.prefix) == u32::from(self.network)
    }

    /// Usable host addresses
    ///
    /// Network and broadcast addresses are excluded except for /31 and /32,
    /// where every address is a host.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> {
        let first = u32::from(self.network);
        let last = u32::from(self.broadcast());
        let (start, end) = if self.prefix >= 31 {
            (first, last)
        } else {
            (first + 1, last - 1)
        };
        (start..=end).map(Ipv4Addr::from)
    }

    pub fn host_count(&self) -> u64 {
        match self.prefix {
            32 => 1,
            31 => 2,
            p => (1u64 << (32 - p)) - 2,
        }
    }
}

impl fmt::Display for Ipv4Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Ipv4Subnet {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| DiscoveryError::InvalidSubnet(s.to_string()))?;
        let address: Ipv4Addr = address
            .parse()
            .map_err(|_| DiscoveryError::InvalidSubnet(s.to_string()))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| DiscoveryError::InvalidSubnet(s.to_string()))?;
        Self::new(address, prefix)
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

/// Private range (10/8, 172.16/12, 192.168/16), not loopback, not link-local
pub fn is_private_lan_address(address: Ipv4Addr) -> bool {
    address.is_private() && !address.is_loopback() && !address.is_link_local()
}

/// Extract every `inet a.b.c.d/nn` pair from `ip -4 addr` output, in order
pub fn parse_ip_addr_output(output: &str) -> Vec<(Ipv4Addr, u8)> {
    let mut found = Vec::new();
    for line in output.lines() {
        let mut words = line.split_whitespace();
        while let Some(word) = words.next() {
            if word != "inet" {
                continue;
            }
            let Some(cidr) = words.next() else {
                break;
            };
            let Some((address, prefix)) = cidr.split_once('/') else {
                continue;
            };
            if let (Ok(address), Ok(prefix)) = (address.parse(), prefix.parse()) {
                found.push((address, prefix));
            }
        }
    }
    found
}

/// Subnet of the first private LAN interface in `ip -4 addr` output
pub fn select_lan_subnet(output: &str) -> DiscoveryResult<Ipv4Subnet> {
    for (address, prefix) in parse_ip_addr_output(output) {
        if !is_private_lan_address(address) {
            debug!("[DISCOVERY] Skipping interface address {}/{}", address, prefix);
            continue;
        }
        let subnet = Ipv4Subnet::new(address, prefix)?;
        info!(
            "[DISCOVERY] Detected LAN subnet: {} (interface IP: {})",
            subnet, address
        );
        return Ok(subnet);
    }
    Err(DiscoveryError::NoLanAddress)
}

/// Query the host's interfaces with `ip -4 addr` and pick the LAN subnet
pub fn detect_lan_subnet() -> DiscoveryResult<Ipv4Subnet> {
    let output = Command::new("ip")
        .args(["-4", "addr"])
        .output()
        .map_err(|e| DiscoveryError::CommandFailed(e.to_string()))?;
    if !output.status.success() {
        return Err(DiscoveryError::CommandFailed(format!(
            "`ip -4 addr` exited with {}",
            output.status
        )));
    }
    select_lan_subnet(&String::from_utf8_lossy(&output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP_ADDR_OUTPUT: &str = "\
1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN group default qlen 1000
    inet 127.0.0.1/8 scope host lo
       valid_lft forever preferred_lft forever
2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc fq_codel state UP group default qlen 1000
    inet 169.254.10.2/16 brd 169.254.255.255 scope link eth0
    inet 192.168.1.37/24 brd 192.168.1.255 scope global dynamic noprefixroute eth0
       valid_lft 84761sec preferred_lft 84761sec
3: wlan0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500
    inet 10.20.0.4/16 brd 10.20.255.255 scope global wlan0
";

    #[test]
    fn test_parse_ip_addr_output() {
        let parsed = parse_ip_addr_output(IP_ADDR_OUTPUT);
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[0], (Ipv4Addr::new(127, 0, 0, 1), 8));
        assert_eq!(parsed[2], (Ipv4Addr::new(192, 168, 1, 37), 24));
    }

    #[test]
    fn test_select_first_private_lan() {
        let subnet = select_lan_subnet(IP_ADDR_OUTPUT).unwrap();
        assert_eq!(subnet.to_string(), "192.168.1.0/24");
    }

    #[test]
    fn test_no_lan_address() {
        let output = "    inet 127.0.0.1/8 scope host lo\n    inet 8.8.8.8/24 scope global eth0\n";
        assert!(matches!(select_lan_subnet(output), Err(DiscoveryError::NoLanAddress)));
    }

    #[test]
    fn test_private_ranges() {
        assert!(is_private_lan_address(Ipv4Addr::new(10, 1, 2, 3)));
        assert!(is_private_lan_address(Ipv4Addr::new(172, 16, 0, 1)));
        assert!(is_private_lan_address(Ipv4Addr::new(172, 31, 255, 1)));
        assert!(!is_private_lan_address(Ipv4Addr::new(172, 32, 0, 1)));
        assert!(is_private_lan_address(Ipv4Addr::new(192, 168, 0, 9)));
        assert!(!is_private_lan_address(Ipv4Addr::new(127, 0, 0, 1)));
        assert!(!is_private_lan_address(Ipv4Addr::new(169, 254, 1, 1)));
    }

    #[test]
    fn test_hosts() {
        let subnet: Ipv4Subnet = "192.168.7.99/29".parse().unwrap();
        assert_eq!(subnet.network(), Ipv4Addr::new(192, 168, 7, 96));
        assert_eq!(subnet.broadcast(), Ipv4Addr::new(192, 168, 7, 103));
        let hosts: Vec<_> = subnet.hosts().collect();
        assert_eq!(hosts.len(), 6);
        assert_eq!(subnet.host_count(), 6);
        assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 7, 97));
        assert_eq!(hosts[5], Ipv4Addr::new(192, 168, 7, 102));
        assert!(subnet.contains(Ipv4Addr::new(192, 168, 7, 100)));
        assert!(!subnet.contains(Ipv4Addr::new(192, 168, 7, 104)));
    }

    #[test]
    fn test_point_to_point_and_single_host() {
        let p2p = Ipv4Subnet::new(Ipv4Addr::new(10, 0, 0, 1), 31).unwrap();
        assert_eq!(p2p.hosts().count(), 2);
        let single = Ipv4Subnet::new(Ipv4Addr::new(10, 0, 0, 1), 32).unwrap();
        assert_eq!(single.hosts().collect::<Vec<_>>(), vec![Ipv4Addr::new(10, 0, 0, 1)]);
    }

    #[test]
    fn test_bad_subnets() {
        assert!("10.0.0.0".parse::<Ipv4Subnet>().is_err());
        assert!("10.0.0.0/33".parse::<Ipv4Subnet>().is_err());
        assert!("ten/8".parse::<Ipv4Subnet>().is_err());
    }
}
