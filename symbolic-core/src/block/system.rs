//! Block source backed by the global allocator.

use super::{BLOCK_ALIGN, Block, BlockSource};
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Serves blocks from the Rust global allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBlocks;

impl SystemBlocks {
    /// Create a new system block source.
    pub fn new() -> Self {
        Self
    }

    fn layout(size: usize) -> Option<Layout> {
        Layout::from_size_align(size.max(1), BLOCK_ALIGN).ok()
    }
}

impl BlockSource for SystemBlocks {
    fn allocate(&self, size: usize) -> Option<Block> {
        let layout = Self::layout(size)?;
        // SAFETY: layout has a non-zero size.
        let ptr = NonNull::new(unsafe { alloc::alloc(layout) })?;
        // SAFETY: ptr is a fresh allocation of `size` bytes owned by the block.
        Some(unsafe { Block::from_raw_parts(ptr, size) })
    }

    fn deallocate(&self, block: Block) {
        let (ptr, size) = block.into_raw_parts();
        if let Some(layout) = Self::layout(size) {
            // SAFETY: the block came from `allocate` with this same layout.
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
        }
    }
}
