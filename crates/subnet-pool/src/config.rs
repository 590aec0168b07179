//! Pool configuration

use ipnet::Ipv4Net;
use serde::Deserialize;
use std::net::Ipv4Addr;

/// Default CIDR block carved into container subnets
pub const DEFAULT_POOL: Ipv4Net = Ipv4Net::new_assert(Ipv4Addr::new(10, 254, 0, 0), 22);

/// Default MTU for container interfaces
pub const DEFAULT_MTU: u32 = 1500;

/// Default prefix for host/container interface names
pub const DEFAULT_INTERFACE_PREFIX: &str = "cn";

/// Configuration for a [`SubnetPool`](crate::SubnetPool)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// CIDR block subdivided into dynamically allocated /30 container
    /// subnets
    pub network: Ipv4Net,
    /// MTU applied to container network interfaces
    pub mtu: u32,
    /// Prefix for derived interface and bridge names
    pub interface_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_POOL,
            mtu: DEFAULT_MTU,
            interface_prefix: DEFAULT_INTERFACE_PREFIX.to_string(),
        }
    }
}
