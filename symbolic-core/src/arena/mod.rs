//! Append-only arenas holding interned name chunks.
//!
//! Every interned name lives in exactly one chunk inside one arena. Arenas
//! are fixed-size blocks obtained from a [`BlockSource`](crate::block::BlockSource)
//! and are filled by bumping an offset; a chunk never moves or changes once
//! written, except for the atomic link that chains it into its hash bucket.
//!
//! # Layout
//!
//! ```text
//! ┌──────────────────────── Arena (arena_size bytes) ───────────────────────┐
//! │ Chunk 0 │ Chunk 1 │ Chunk 2 │ ...                        │ unused space │
//! └─────────────────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────── Chunk ───────────────────────────────────┐
//! │ next: u64 │ hash: u32 │ meta: u32 │ name bytes │ NUL │ pad to 8 bytes    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A chunk is addressed by a [`Handle`](crate::types::Handle) naming its
//! arena index and byte offset. When the current arena cannot fit a chunk,
//! the pool opens the next arena; at the arena limit it reports exhaustion.

mod chunk;
mod pool;

pub use chunk::{
    ChunkHeader, END_OF_CHAIN, Entry, HASH_OFFSET, HEADER_SIZE, LINK_OFFSET, META_OFFSET,
    chunk_footprint, encode_chunk,
};
pub use pool::{ArenaPool, ArenaWriter};
