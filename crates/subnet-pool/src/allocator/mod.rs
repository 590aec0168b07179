//! Subnet and IP allocation machinery
//!
//! Provides:
//! - the /30 grid arithmetic over the dynamic pool (pure functions)
//! - the allocation table tracking live subnets and their held addresses

pub mod grid;
mod table;

pub use table::{AllocationEntry, AllocationTable};
