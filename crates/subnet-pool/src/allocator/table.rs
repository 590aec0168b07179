//! The guarded allocation state: which subnets are live, and which addresses
//! each of them holds
//!
//! Entries are keyed by the subnet's network address for deterministic
//! ascending iteration; a key hit is confirmed against the full subnet value
//! so equal bases with different prefix lengths cannot be confused. The table
//! itself is not synchronized; the service facade drives it under a single
//! mutex.

use ipnet::Ipv4Net;
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use crate::allocator::grid;
use crate::models::{IpSelector, SubnetSelector};
use crate::{Error, Result};

/// A live subnet and the addresses held within it
#[derive(Debug, Clone)]
pub struct AllocationEntry {
    subnet: Ipv4Net,
    ips: BTreeSet<u32>,
}

impl AllocationEntry {
    fn new(subnet: Ipv4Net) -> Self {
        Self {
            subnet,
            ips: BTreeSet::new(),
        }
    }

    /// The subnet this entry tracks
    pub fn subnet(&self) -> Ipv4Net {
        self.subnet
    }

    /// Whether multiple containers may sit on this subnet
    ///
    /// Subnets of prefix 30 or longer carry four or fewer addresses and are held by
    /// exactly one container; wider subnets admit concurrent holders.
    pub fn shareable(&self) -> bool {
        self.subnet.prefix_len() < grid::SLOT_PREFIX
    }

    /// Whether `ip` is currently held in this entry
    pub fn holds(&self, ip: Ipv4Addr) -> bool {
        self.ips.contains(&u32::from(ip))
    }

    /// Number of addresses held
    pub fn held_count(&self) -> usize {
        self.ips.len()
    }

    /// Lowest unheld address that is neither the network, the gateway, nor
    /// the broadcast address
    fn first_free_host(&self) -> Option<Ipv4Addr> {
        if self.subnet.prefix_len() >= 31 {
            return None;
        }
        let network = u32::from(self.subnet.network());
        let broadcast = u32::from(self.subnet.broadcast());
        (network + 2..broadcast)
            .find(|candidate| !self.ips.contains(candidate))
            .map(Ipv4Addr::from)
    }
}

/// Mapping from live subnet to its [`AllocationEntry`]
#[derive(Debug)]
pub struct AllocationTable {
    pool: Ipv4Net,
    entries: BTreeMap<u32, AllocationEntry>,
}

impl AllocationTable {
    /// Create an empty table over the given dynamic pool
    ///
    /// Host bits of the pool are zeroed so the /30 grid is aligned.
    pub fn new(pool: Ipv4Net) -> Self {
        Self {
            pool: pool.trunc(),
            entries: BTreeMap::new(),
        }
    }

    /// The dynamic pool this table draws from
    pub fn pool(&self) -> Ipv4Net {
        self.pool
    }

    /// Total number of /30 slots in the pool, independent of current
    /// allocations
    pub fn capacity(&self) -> usize {
        grid::capacity(&self.pool)
    }

    /// Number of live subnets
    pub fn subnet_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of held addresses across all live subnets
    pub fn ip_count(&self) -> usize {
        self.entries.values().map(AllocationEntry::held_count).sum()
    }

    /// Resolve the selector pair, record the chosen allocation, and return it
    pub fn allocate(
        &mut self,
        subnet_sel: SubnetSelector,
        ip_sel: IpSelector,
    ) -> Result<(Ipv4Net, Ipv4Addr)> {
        match subnet_sel {
            SubnetSelector::Dynamic => self.allocate_dynamic_subnet(ip_sel),
            SubnetSelector::Static(requested) => self.allocate_static_subnet(requested, ip_sel),
        }
    }

    /// Drop `ip` from the entry for `subnet`
    ///
    /// Returns `true` when the entry held no further addresses and was
    /// removed, meaning the subnet itself died.
    pub fn release(&mut self, subnet: Ipv4Net, ip: Ipv4Addr) -> Result<bool> {
        let subnet = subnet.trunc();
        let key = u32::from(subnet.network());
        let entry = match self.entries.get_mut(&key) {
            Some(entry) if entry.subnet == subnet => entry,
            _ => return Err(Error::ReleasedUnallocatedSubnet(subnet, ip)),
        };
        if !entry.ips.remove(&u32::from(ip)) {
            return Err(Error::ReleasedUnallocatedSubnet(subnet, ip));
        }
        if entry.ips.is_empty() {
            self.entries.remove(&key);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Re-absorb a previously persisted allocation without going through the
    /// allocation policy
    ///
    /// Validates the pair like a static allocation would, except that a
    /// subnet inside the dynamic pool is accepted, since that is where
    /// recovered dynamic allocations land, and the occupied slot is excluded
    /// from dynamic enumeration from then on. Not idempotent: each persisted
    /// record corresponds to exactly one live allocation, so a duplicate pair
    /// is a conflict.
    pub fn recover(&mut self, subnet: Ipv4Net, ip: Ipv4Addr) -> Result<()> {
        let subnet = subnet.trunc();
        usable_ip(&subnet, ip)?;
        match self.entries.get(&u32::from(subnet.network())) {
            Some(entry) if entry.subnet == subnet => {
                if !entry.shareable() || entry.holds(ip) {
                    return Err(Error::AlreadyAllocated(format!("{subnet} {ip}")));
                }
            }
            Some(_) => return Err(Error::AlreadyAllocated(subnet.to_string())),
            None => {
                if self.conflicts(&subnet) {
                    return Err(Error::AlreadyAllocated(subnet.to_string()));
                }
            }
        }
        self.insert(subnet, ip);
        Ok(())
    }

    fn allocate_dynamic_subnet(&mut self, ip_sel: IpSelector) -> Result<(Ipv4Net, Ipv4Addr)> {
        let subnet = match ip_sel {
            // Lowest slot that overlaps no live subnet, static or recovered.
            IpSelector::Dynamic => grid::slash30s(&self.pool)
                .find(|slot| !self.conflicts(slot))
                .ok_or(Error::InsufficientSubnets(self.pool))?,
            // A pinned IP names its slot; any occupant is a conflict.
            IpSelector::Static(ip) => {
                if !grid::contains(&self.pool, ip) {
                    return Err(Error::InvalidIp(ip, self.pool));
                }
                let slot = grid::slash30_containing(ip);
                if self.conflicts(&slot) {
                    return Err(Error::AlreadyAllocated(slot.to_string()));
                }
                slot
            }
        };
        let ip = self.pick_ip(&AllocationEntry::new(subnet), ip_sel)?;
        self.insert(subnet, ip);
        Ok((subnet, ip))
    }

    fn allocate_static_subnet(
        &mut self,
        requested: Ipv4Net,
        ip_sel: IpSelector,
    ) -> Result<(Ipv4Net, Ipv4Addr)> {
        let subnet = requested.trunc();
        if grid::within(&self.pool, &subnet) {
            // Static requests never carve up the dynamic range, taken or not.
            return Err(Error::AlreadyAllocated(subnet.to_string()));
        }
        let key = u32::from(subnet.network());
        let ip = match self.entries.get(&key) {
            Some(entry) if entry.subnet == subnet => {
                if !entry.shareable() {
                    return Err(Error::AlreadyAllocated(subnet.to_string()));
                }
                self.pick_ip(entry, ip_sel)?
            }
            Some(_) => return Err(Error::AlreadyAllocated(subnet.to_string())),
            None => {
                if self.conflicts(&subnet) {
                    return Err(Error::AlreadyAllocated(subnet.to_string()));
                }
                self.pick_ip(&AllocationEntry::new(subnet), ip_sel)?
            }
        };
        self.insert(subnet, ip);
        Ok((subnet, ip))
    }

    /// Resolve the IP selector against an entry (possibly a fresh, empty one)
    fn pick_ip(&self, entry: &AllocationEntry, ip_sel: IpSelector) -> Result<Ipv4Addr> {
        match ip_sel {
            IpSelector::Dynamic => entry
                .first_free_host()
                .ok_or(Error::NoAvailableIps(entry.subnet)),
            IpSelector::Static(ip) => {
                usable_ip(&entry.subnet, ip)?;
                if entry.holds(ip) {
                    return Err(Error::AlreadyAllocated(ip.to_string()));
                }
                Ok(ip)
            }
        }
    }

    fn insert(&mut self, subnet: Ipv4Net, ip: Ipv4Addr) {
        let entry = self
            .entries
            .entry(u32::from(subnet.network()))
            .or_insert_with(|| AllocationEntry::new(subnet));
        entry.ips.insert(u32::from(ip));
    }

    fn conflicts(&self, subnet: &Ipv4Net) -> bool {
        self.entries
            .values()
            .any(|entry| grid::overlaps(&entry.subnet, subnet))
    }
}

/// An allocatable IP lies inside the subnet and is neither its network nor
/// its broadcast address
fn usable_ip(subnet: &Ipv4Net, ip: Ipv4Addr) -> Result<()> {
    if !grid::contains(subnet, ip) || ip == subnet.network() || ip == subnet.broadcast() {
        return Err(Error::InvalidIp(ip, *subnet));
    }
    Ok(())
}
