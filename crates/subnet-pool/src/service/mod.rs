//! Thread-safe facade over the allocation table

mod pool;

pub use pool::{PoolStats, SubnetPool};
