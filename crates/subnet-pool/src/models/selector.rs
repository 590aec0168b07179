//! Selector algebra driving allocation decisions
//!
//! A caller states what it wants as a pair of selectors: one for the subnet,
//! one for the container IP inside it. The free-form network spec carried by
//! a container-create request parses into such a pair.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::Result;

/// How the subnet for an allocation is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetSelector {
    /// Take the lowest free /30 slot from the dynamic pool
    Dynamic,
    /// Use this exact subnet (host bits are ignored)
    Static(Ipv4Net),
}

/// How the container IP within the subnet is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpSelector {
    /// Take the lowest free host address
    Dynamic,
    /// Use this exact address
    Static(Ipv4Addr),
}

/// A parsed container network request
///
/// The wire form is a free-form string:
/// - `""` asks for a fully dynamic subnet and IP;
/// - a bare address (`"10.9.3.5"`) is treated as `/30`;
/// - a CIDR whose address part is the network address (`"10.9.3.4/30"`)
///   names a static subnet and leaves the IP choice dynamic;
/// - a CIDR with host bits set (`"10.9.3.5/30"`) additionally pins the IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkSpec {
    pub subnet: SubnetSelector,
    pub ip: IpSelector,
}

impl NetworkSpec {
    /// A fully dynamic request
    pub fn dynamic() -> Self {
        Self {
            subnet: SubnetSelector::Dynamic,
            ip: IpSelector::Dynamic,
        }
    }

    /// Parse the network spec of a container-create request
    pub fn parse(spec: &str) -> Result<Self> {
        if spec.is_empty() {
            return Ok(Self::dynamic());
        }
        let text = if spec.contains('/') {
            spec.to_string()
        } else {
            format!("{spec}/30")
        };
        let requested = Ipv4Net::from_str(&text)?;
        let subnet = requested.trunc();
        let ip = if requested.addr() == subnet.network() {
            IpSelector::Dynamic
        } else {
            IpSelector::Static(requested.addr())
        };
        Ok(Self {
            subnet: SubnetSelector::Static(subnet),
            ip,
        })
    }
}
