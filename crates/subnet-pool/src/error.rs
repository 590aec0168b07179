//! Error types for subnet and IP allocation

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Result type for allocation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Subnet pool errors
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Every /30 slot in the dynamic pool is taken
    #[error("no free /30 subnets remain in pool {0}")]
    InsufficientSubnets(Ipv4Net),

    /// A shareable subnet has no free host address left
    #[error("no available IPs in subnet {0}")]
    NoAvailableIps(Ipv4Net),

    /// The requested subnet or address conflicts with a live allocation
    #[error("already allocated: {0}")]
    AlreadyAllocated(String),

    /// Release of a subnet/IP pair that is not currently held
    #[error("released {1} in {0}, which is not allocated")]
    ReleasedUnallocatedSubnet(Ipv4Net, Ipv4Addr),

    /// The requested IP is outside the subnet, or is its network or
    /// broadcast address
    #[error("IP {0} is not a usable address in subnet {1}")]
    InvalidIp(Ipv4Addr, Ipv4Net),

    /// Malformed or non-IPv4 CIDR
    #[error("invalid IPv4 range: {0}")]
    InvalidRange(String),
}

impl From<ipnet::AddrParseError> for Error {
    fn from(e: ipnet::AddrParseError) -> Self {
        Error::InvalidRange(e.to_string())
    }
}

impl From<ipnet::PrefixLenError> for Error {
    fn from(e: ipnet::PrefixLenError) -> Self {
        Error::InvalidRange(e.to_string())
    }
}

impl From<std::net::AddrParseError> for Error {
    fn from(e: std::net::AddrParseError) -> Self {
        Error::InvalidRange(e.to_string())
    }
}
