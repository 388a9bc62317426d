//! Block source capability.
//!
//! The name table never allocates memory itself. Every arena is a fixed-size
//! block obtained from a [`BlockSource`] when the table needs room, and every
//! block goes back to the same source when the table is dropped. Embedders
//! supply their own source to route name storage through an engine allocator;
//! [`SystemBlocks`] serves blocks from the global allocator.

mod system;

pub use system::SystemBlocks;

use std::ptr::NonNull;

/// Alignment every block must satisfy.
///
/// Chunks keep an atomic link at their first word, so blocks and chunk
/// offsets are 8-byte aligned.
pub const BLOCK_ALIGN: usize = 8;

/// An owned, contiguous block of raw memory.
///
/// A `Block` is a plain pointer and length; it frees nothing on drop. It
/// must be handed back to the [`BlockSource`] that produced it.
#[derive(Debug)]
pub struct Block {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: a Block is exclusively owned memory with no thread affinity.
unsafe impl Send for Block {}
// SAFETY: Block exposes no interior access through a shared reference.
unsafe impl Sync for Block {}

impl Block {
    /// Wrap a raw allocation.
    ///
    /// # Safety
    /// `ptr` must point to `len` bytes that are valid for reads and writes
    /// and owned by nobody else until the block is deallocated.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Release ownership of the raw allocation.
    pub fn into_raw_parts(self) -> (NonNull<u8>, usize) {
        (self.ptr, self.len)
    }

    /// Base address of the block.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Size of the block in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the block holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the block base satisfies [`BLOCK_ALIGN`].
    pub fn is_aligned(&self) -> bool {
        (self.ptr.as_ptr() as usize) % BLOCK_ALIGN == 0
    }
}

/// Provider trait for arena memory.
///
/// Implementations must be shareable across threads: the table calls
/// `allocate` while holding its mutation lock and `deallocate` on teardown.
pub trait BlockSource: Send + Sync {
    /// Supply a block of at least `size` bytes aligned to [`BLOCK_ALIGN`],
    /// or `None` when no memory is available.
    fn allocate(&self, size: usize) -> Option<Block>;

    /// Take back a block previously returned by `allocate`.
    fn deallocate(&self, block: Block);
}
