//! /30 grid arithmetic over the dynamic pool
//!
//! Pure helpers for enumerating the fixed-size container subnets inside a
//! pool CIDR and for the address-level facts (network, gateway, broadcast,
//! containment, overlap) the allocation table is built on. All arithmetic is
//! on the `u32` form of the address.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Prefix length of a container subnet slot
pub const SLOT_PREFIX: u8 = 30;

/// Number of /30 slots in the pool
///
/// A pool of prefix length `p` carries `2^(30 - p)` slots; /31 and /32 pools
/// carry none. Independent of current allocations.
pub fn capacity(pool: &Ipv4Net) -> usize {
    if pool.prefix_len() <= SLOT_PREFIX {
        1usize << (SLOT_PREFIX - pool.prefix_len())
    } else {
        0
    }
}

/// The subnet's base address with host bits zeroed
pub fn network_ip(subnet: &Ipv4Net) -> Ipv4Addr {
    subnet.network()
}

/// Network address + 1, the host's end of the link into the container
///
/// Undefined for /31 and /32 subnets; callers never ask for those.
pub fn gateway_ip(subnet: &Ipv4Net) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(subnet.network()) + 1)
}

/// The subnet's base address with all host bits set
pub fn broadcast_ip(subnet: &Ipv4Net) -> Ipv4Addr {
    subnet.broadcast()
}

/// Whether `ip`'s high `prefix` bits equal the subnet's
pub fn contains(subnet: &Ipv4Net, ip: Ipv4Addr) -> bool {
    subnet.contains(&ip)
}

/// Whether two subnets share any address
///
/// For CIDR-aligned blocks this holds exactly when one contains the other's
/// network address.
pub fn overlaps(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

/// Whether `subnet` lies wholly inside `pool`
pub fn within(pool: &Ipv4Net, subnet: &Ipv4Net) -> bool {
    pool.contains(&subnet.network()) && pool.contains(&subnet.broadcast())
}

/// The /30 slots inside `pool`, ascending by base address
///
/// Length equals [`capacity`]. Empty for /31 and /32 pools.
pub fn slash30s(pool: &Ipv4Net) -> impl Iterator<Item = Ipv4Net> {
    let base = u32::from(pool.network());
    (0..capacity(pool) as u32).map(move |i| slot(base + (i << 2)))
}

/// The grid-aligned /30 whose range covers `ip`
pub fn slash30_containing(ip: Ipv4Addr) -> Ipv4Net {
    slot(u32::from(ip) & !0b11)
}

fn slot(base: u32) -> Ipv4Net {
    Ipv4Net::new_assert(Ipv4Addr::from(base), SLOT_PREFIX)
}
