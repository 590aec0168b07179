//! Container network model and snapshot records
//!
//! A [`ContainerNetwork`] bundles everything the interface-configuration
//! collaborators need to wire a container: the allocated subnet and IP, the
//! gateway, and the derived interface and bridge names. Its flat persisted
//! form is a [`NetworkRecord`], which the caller snapshots and replays
//! through recovery after a restart.

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use uuid::Uuid;

use crate::allocator::grid;
use crate::config::PoolConfig;

// Room for the "-0"/"-1" suffix within the kernel's 16-char interface name
// limit.
const MAX_IFACE_BASE: usize = 14;

/// A live container network attachment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerNetwork {
    /// Unique attachment identifier
    pub id: Uuid,
    /// The allocated subnet
    pub subnet: Ipv4Net,
    /// The container's address within the subnet
    pub container_ip: Ipv4Addr,
    /// The host's end of the link into the container
    pub gateway_ip: Ipv4Addr,
    /// Whether further containers may join this subnet
    pub shareable: bool,
    /// Interface name inside the container
    pub container_ifc: String,
    /// Host-side interface name
    pub host_ifc: String,
    /// Bridge interface name, derived from the subnet's network address
    pub bridge_ifc: String,
    /// MTU for the container interfaces
    pub mtu: u32,
    /// When the attachment was allocated or recovered
    pub allocated_at: DateTime<Utc>,
}

impl ContainerNetwork {
    /// Build the attachment for a freshly allocated `(subnet, ip)` pair
    pub fn new(
        subnet: Ipv4Net,
        container_ip: Ipv4Addr,
        container_id: &str,
        config: &PoolConfig,
    ) -> Self {
        let prefix = &config.interface_prefix;
        let base = short_id(container_id, MAX_IFACE_BASE.saturating_sub(prefix.len()));

        Self {
            id: Uuid::new_v4(),
            subnet,
            container_ip,
            gateway_ip: grid::gateway_ip(&subnet),
            shareable: subnet.prefix_len() < grid::SLOT_PREFIX,
            container_ifc: format!("{prefix}{base}-1"),
            host_ifc: format!("{prefix}{base}-0"),
            bridge_ifc: bridge_name(prefix, &subnet),
            mtu: config.mtu,
            allocated_at: Utc::now(),
        }
    }

    /// Rebuild the attachment from its persisted record
    ///
    /// The recorded interface names are kept verbatim; the host interfaces
    /// they name may still exist from before the restart.
    pub fn from_record(record: &NetworkRecord, config: &PoolConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            subnet: record.subnet,
            container_ip: record.container_ip,
            gateway_ip: grid::gateway_ip(&record.subnet),
            shareable: record.shareable,
            container_ifc: record.container_ifc.clone(),
            host_ifc: record.host_ifc.clone(),
            bridge_ifc: record.bridge_ifc.clone(),
            mtu: config.mtu,
            allocated_at: Utc::now(),
        }
    }

    /// The flat form the caller persists for replay after a restart
    pub fn record(&self) -> NetworkRecord {
        NetworkRecord {
            subnet: self.subnet,
            container_ip: self.container_ip,
            container_ifc: self.container_ifc.clone(),
            host_ifc: self.host_ifc.clone(),
            bridge_ifc: self.bridge_ifc.clone(),
            shareable: self.shareable,
        }
    }
}

/// Flat persisted form of a [`ContainerNetwork`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub subnet: Ipv4Net,
    pub container_ip: Ipv4Addr,
    pub container_ifc: String,
    pub host_ifc: String,
    pub bridge_ifc: String,
    pub shareable: bool,
}

/// Last `max` bytes of the container id, so distinct ids keep distinct
/// interface names
fn short_id(container_id: &str, max: usize) -> &str {
    let len = container_id.len();
    if len < max {
        return container_id;
    }
    let mut start = len - max;
    while !container_id.is_char_boundary(start) {
        start += 1;
    }
    &container_id[start..]
}

fn bridge_name(prefix: &str, subnet: &Ipv4Net) -> String {
    let hex: String = subnet
        .network()
        .octets()
        .iter()
        .map(|octet| format!("{octet:02x}"))
        .collect();
    format!("{prefix}br-{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn attachment(container_id: &str) -> ContainerNetwork {
        ContainerNetwork::new(
            Ipv4Net::from_str("10.254.0.4/30").unwrap(),
            Ipv4Addr::from_str("10.254.0.6").unwrap(),
            container_id,
            &PoolConfig::default(),
        )
    }

    #[test]
    fn test_derived_fields() {
        let network = attachment("deadbeef");
        assert_eq!(network.gateway_ip, Ipv4Addr::new(10, 254, 0, 5));
        assert!(!network.shareable);
        assert_eq!(network.host_ifc, "cndeadbeef-0");
        assert_eq!(network.container_ifc, "cndeadbeef-1");
        assert_eq!(network.bridge_ifc, "cnbr-0afe0004");
        assert_eq!(network.mtu, 1500);
    }

    #[test]
    fn test_long_container_id_keeps_the_tail() {
        let network = attachment("0123456789abcdefgh");
        // 14 chars minus the 2-char prefix leaves 12 of the id.
        assert_eq!(network.host_ifc, "cn6789abcdefgh-0");
        assert!(network.host_ifc.len() <= 16);
    }

    #[test]
    fn test_multibyte_container_id_truncates_on_char_boundaries() {
        let network = attachment("abcé€é€éd");
        // The byte 12 back from the end splits the first €; truncation moves
        // forward to the next boundary.
        assert_eq!(network.host_ifc, "cn€é€éd-0");
        assert!(network.host_ifc.len() <= 16);
    }

    #[test]
    fn test_record_round_trip() {
        let network = attachment("deadbeef");
        let json = serde_json::to_string(&network.record()).unwrap();
        let record: NetworkRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, network.record());

        let rebuilt = ContainerNetwork::from_record(&record, &PoolConfig::default());
        assert_eq!(rebuilt.subnet, network.subnet);
        assert_eq!(rebuilt.container_ip, network.container_ip);
        assert_eq!(rebuilt.gateway_ip, network.gateway_ip);
        assert_eq!(rebuilt.host_ifc, network.host_ifc);
    }

    #[test]
    fn test_shareable_flag_follows_prefix() {
        let network = ContainerNetwork::new(
            Ipv4Net::from_str("10.9.0.0/24").unwrap(),
            Ipv4Addr::from_str("10.9.0.2").unwrap(),
            "c1",
            &PoolConfig::default(),
        );
        assert!(network.shareable);
    }
}
