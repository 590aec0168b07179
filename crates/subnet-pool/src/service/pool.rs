//! Thread-safe subnet pool
//!
//! The facade every caller goes through. One pool instance is shared across
//! container create/destroy paths (wrapped in an `Arc`); every operation on
//! the allocation table, including the overlap scan and the dynamic /30
//! walk, runs under a single mutex so concurrent callers always observe a
//! consistent table. Nothing blocks or performs I/O while the lock is held.

use ipnet::Ipv4Net;
use parking_lot::Mutex;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::allocator::{grid, AllocationTable};
use crate::config::PoolConfig;
use crate::models::{ContainerNetwork, IpSelector, NetworkRecord, NetworkSpec, SubnetSelector};
use crate::Result;

/// Concurrency-safe allocator of container subnets and the IPs within them
pub struct SubnetPool {
    config: PoolConfig,
    pool: Ipv4Net,
    table: Mutex<AllocationTable>,
}

impl SubnetPool {
    /// Create a pool over the given dynamic CIDR block
    pub fn new(pool: Ipv4Net) -> Self {
        Self::with_config(PoolConfig {
            network: pool,
            ..PoolConfig::default()
        })
    }

    /// Create a pool from a full configuration
    pub fn with_config(config: PoolConfig) -> Self {
        let pool = config.network.trunc();
        Self {
            config,
            pool,
            table: Mutex::new(AllocationTable::new(pool)),
        }
    }

    /// Create a pool from CIDR text, rejecting malformed or non-IPv4 input
    pub fn from_cidr(cidr: &str) -> Result<Self> {
        Ok(Self::new(Ipv4Net::from_str(cidr)?))
    }

    /// The dynamic pool, host bits zeroed
    pub fn pool(&self) -> Ipv4Net {
        self.pool
    }

    /// Total number of /30 slots in the pool, independent of current
    /// allocations
    pub fn capacity(&self) -> usize {
        grid::capacity(&self.pool)
    }

    /// Allocate a subnet and an IP within it, as described by the selector
    /// pair
    pub fn allocate(
        &self,
        subnet_sel: SubnetSelector,
        ip_sel: IpSelector,
    ) -> Result<(Ipv4Net, Ipv4Addr)> {
        let (subnet, ip) = self.table.lock().allocate(subnet_sel, ip_sel)?;
        tracing::info!(subnet = %subnet, ip = %ip, "allocated container subnet");
        Ok((subnet, ip))
    }

    /// Allocate the lowest free /30 from the pool with its single usable
    /// host
    ///
    /// Equivalent to `allocate(Dynamic, Dynamic)`.
    pub fn allocate_dynamically(&self) -> Result<(Ipv4Net, Ipv4Addr)> {
        self.allocate(SubnetSelector::Dynamic, IpSelector::Dynamic)
    }

    /// Allocate within the named subnet, choosing the IP dynamically
    ///
    /// Equivalent to `allocate(Static(cidr), Dynamic)`; for a /30 this
    /// deterministically yields the single usable host.
    pub fn allocate_statically(&self, cidr: Ipv4Net) -> Result<(Ipv4Net, Ipv4Addr)> {
        self.allocate(SubnetSelector::Static(cidr), IpSelector::Dynamic)
    }

    /// Return `ip` to the pool; `true` means the subnet held no further
    /// addresses and died with it
    pub fn release(&self, subnet: Ipv4Net, ip: Ipv4Addr) -> Result<bool> {
        let released = self.table.lock().release(subnet, ip)?;
        tracing::info!(subnet = %subnet, ip = %ip, released_subnet = released, "released container IP");
        Ok(released)
    }

    /// Re-absorb a persisted allocation during restart replay
    pub fn recover(&self, subnet: Ipv4Net, ip: Ipv4Addr) -> Result<()> {
        self.table.lock().recover(subnet, ip)?;
        tracing::info!(subnet = %subnet, ip = %ip, "recovered container subnet");
        Ok(())
    }

    /// Allocate for a container-create request and derive its interface
    /// wiring
    pub fn attach(&self, spec: &str, container_id: &str) -> Result<ContainerNetwork> {
        let request = NetworkSpec::parse(spec)?;
        let (subnet, ip) = self.allocate(request.subnet, request.ip)?;
        Ok(ContainerNetwork::new(subnet, ip, container_id, &self.config))
    }

    /// Rebuild an attachment from its snapshot record via recovery
    pub fn reattach(&self, record: &NetworkRecord) -> Result<ContainerNetwork> {
        self.recover(record.subnet, record.container_ip)?;
        Ok(ContainerNetwork::from_record(record, &self.config))
    }

    /// Release an attachment; `true` tells the caller the bridge can go too
    pub fn detach(&self, network: &ContainerNetwork) -> Result<bool> {
        self.release(network.subnet, network.container_ip)
    }

    /// Point-in-time occupancy numbers
    pub fn stats(&self) -> PoolStats {
        let table = self.table.lock();
        PoolStats {
            capacity: table.capacity(),
            live_subnets: table.subnet_count(),
            live_ips: table.ip_count(),
        }
    }
}

/// Occupancy snapshot of a [`SubnetPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub live_subnets: usize,
    pub live_ips: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Net {
        Ipv4Net::from_str(s).unwrap()
    }

    #[test]
    fn test_pool_is_truncated() {
        let pool = SubnetPool::from_cidr("10.2.3.1/29").unwrap();
        assert_eq!(pool.pool(), net("10.2.3.0/29"));
    }

    #[test]
    fn test_from_cidr_rejects_bad_input() {
        assert!(SubnetPool::from_cidr("not-a-cidr").is_err());
        assert!(SubnetPool::from_cidr("fe80::/64").is_err());
    }

    #[test]
    fn test_attach_dynamic() {
        let pool = SubnetPool::from_cidr("10.2.3.0/29").unwrap();
        let network = pool.attach("", "c1").unwrap();

        assert_eq!(network.subnet, net("10.2.3.0/30"));
        assert_eq!(network.container_ip, Ipv4Addr::new(10, 2, 3, 2));
        assert_eq!(network.gateway_ip, Ipv4Addr::new(10, 2, 3, 1));
        assert!(!network.shareable);
    }

    #[test]
    fn test_attach_static_spec() {
        let pool = SubnetPool::from_cidr("10.2.3.0/29").unwrap();
        let network = pool.attach("10.9.3.5/30", "c1").unwrap();

        assert_eq!(network.subnet, net("10.9.3.4/30"));
        assert_eq!(network.container_ip, Ipv4Addr::new(10, 9, 3, 5));
    }

    #[test]
    fn test_detach_reports_subnet_death() {
        let pool = SubnetPool::from_cidr("10.2.3.0/29").unwrap();
        let network = pool.attach("", "c1").unwrap();

        assert!(pool.detach(&network).unwrap());
        assert_eq!(pool.stats().live_subnets, 0);
    }

    #[test]
    fn test_reattach_round_trip() {
        let pool = SubnetPool::from_cidr("10.2.3.0/29").unwrap();
        let network = pool.attach("", "c1").unwrap();
        let record = network.record();

        // Simulated restart: a fresh pool replays the snapshot.
        let restarted = SubnetPool::from_cidr("10.2.3.0/29").unwrap();
        let rebuilt = restarted.reattach(&record).unwrap();
        assert_eq!(rebuilt.subnet, network.subnet);
        assert_eq!(rebuilt.container_ip, network.container_ip);

        // The recovered slot is off the dynamic walk.
        let (next, _) = restarted.allocate_dynamically().unwrap();
        assert_ne!(next, rebuilt.subnet);
    }

    #[test]
    fn test_stats_track_occupancy() {
        let pool = SubnetPool::from_cidr("10.2.3.0/29").unwrap();
        assert_eq!(
            pool.stats(),
            PoolStats {
                capacity: 2,
                live_subnets: 0,
                live_ips: 0
            }
        );

        pool.allocate_dynamically().unwrap();
        pool.allocate_statically(net("10.9.0.0/24")).unwrap();
        pool.allocate_statically(net("10.9.0.0/24")).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.capacity, 2);
        assert_eq!(stats.live_subnets, 2);
        assert_eq!(stats.live_ips, 3);
    }
}
