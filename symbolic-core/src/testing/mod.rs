//! Test doubles for embedding and testing the name table.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use symbolic_core::testing::CountingBlocks;
//! use symbolic_core::{NameTable, PoolConfig};
//!
//! let blocks = Arc::new(CountingBlocks::new());
//! {
//!     let table = NameTable::new(PoolConfig::compact(), blocks.clone())?;
//!     table.add("joint_01a")?;
//! }
//! assert!(blocks.all_returned());
//! ```

mod blocks;

pub use blocks::CountingBlocks;
