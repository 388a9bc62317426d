//! Prelude for convenient imports.
//!
//! # Example
//!
//! ```ignore
//! use symbolic_core::prelude::*;
//! ```

// Name table
pub use crate::table::{NameTable, TableStats};
pub use crate::types::Handle;

// Configuration
pub use crate::config::PoolConfig;

// Error handling
pub use crate::error::{Result, ResultExt, SymbolicError};

// Memory
pub use crate::arena::Entry;
pub use crate::block::{Block, BlockSource, SystemBlocks};
