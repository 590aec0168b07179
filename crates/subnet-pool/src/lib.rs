//! Subnet and IP allocation for container networking
//!
//! Partitions a configured IPv4 CIDR block (the dynamic pool) into /30
//! container subnets, supports static allocation of arbitrary external
//! subnets, and re-absorbs persisted allocations after a restart. The pool
//! is the coordination point guaranteeing that no two live containers ever
//! share overlapping network space.
//!
//! Callers state what they want as a pair of selectors:
//!
//! ```rust
//! use subnet_pool::{IpSelector, SubnetPool, SubnetSelector};
//!
//! let pool = SubnetPool::from_cidr("10.254.0.0/22").unwrap();
//! let (subnet, ip) = pool
//!     .allocate(SubnetSelector::Dynamic, IpSelector::Dynamic)
//!     .unwrap();
//! assert!(subnet.contains(&ip));
//! pool.release(subnet, ip).unwrap();
//! ```
//!
//! Interface configuration, process supervision, and snapshot storage are
//! collaborators: the pool hands them a [`ContainerNetwork`] and accepts
//! replayed [`NetworkRecord`]s, and never touches the host itself.

pub mod allocator;
pub mod config;
pub mod error;
pub mod models;
pub mod service;

pub use config::PoolConfig;
pub use error::{Error, Result};
pub use models::{ContainerNetwork, IpSelector, NetworkRecord, NetworkSpec, SubnetSelector};
pub use service::{PoolStats, SubnetPool};
