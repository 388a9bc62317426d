//! Core types for Symbolic.
//!
//! - `Handle`: packed arena index + offset identifying one interned name

mod handle;

pub use handle::{ARENA_BITS, Handle, MAX_ARENA_INDEX, MAX_OFFSET, OFFSET_BITS, OFFSET_MASK};
