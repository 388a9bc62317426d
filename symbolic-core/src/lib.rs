//! Symbolic Core Library
//!
//! Interns short ASCII strings into compact, case-insensitive handles for use
//! as symbolic identifiers such as asset, bone and event names.
//!
//! # Overview
//!
//! A [`NameTable`] stores every name once in bump-allocated arenas and hands
//! out 8-byte [`Handle`]s. Comparing two names is a single integer
//! comparison, and total name memory is bounded by the table's
//! [`PoolConfig`].
//!
//! # Key Components
//!
//! - **Block source**: injected capability supplying the arena blocks
//! - **Arena pool**: bounded set of fixed-size arenas holding name chunks
//! - **Hash index**: fixed bucket array of append-only chains
//! - **Handle**: packed arena index and offset of a chunk
//! - **Name table**: `add`, `find` and `find_or_add` over all of the above
//!
//! # Example
//!
//! ```ignore
//! use symbolic_core::prelude::*;
//!
//! let table = NameTable::with_system_blocks(PoolConfig::default())?;
//!
//! let hips = table.add("Hips")?;
//! assert_eq!(table.find("hips")?, hips);
//! assert_eq!(table.find_or_add("HIPS")?, hips);
//! assert_eq!(table.content(hips)?, "Hips");
//!
//! // Fail fast where a missing name means corrupt data.
//! let root = table.find_or_add("Root").or_abort();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod block;
pub mod config;
pub mod error;
pub mod hash;
pub mod index;
pub mod prelude;
pub mod table;
pub mod testing;
pub mod types;

// Re-export key types at crate root for convenience
pub use arena::Entry;
pub use block::{BlockSource, SystemBlocks};
pub use config::PoolConfig;
pub use error::{Result, ResultExt, SymbolicError};
pub use table::{NameTable, TableStats};
pub use types::Handle;
