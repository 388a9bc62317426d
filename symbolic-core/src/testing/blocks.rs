//! Block source double that counts traffic.
//!
//! Wraps [`SystemBlocks`] so tests can check that a table returns every
//! block it took exactly once, and can make allocation fail on demand.

use crate::block::{Block, BlockSource, SystemBlocks};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counting block source for tests.
#[derive(Debug, Default)]
pub struct CountingBlocks {
    inner: SystemBlocks,
    /// Allocations allowed before `allocate` starts failing.
    limit: Option<usize>,
    allocated: AtomicUsize,
    refused: AtomicUsize,
    /// Base addresses of blocks handed out and not yet returned.
    live: Mutex<HashSet<usize>>,
    /// Blocks returned that were not live.
    foreign: AtomicUsize,
}

impl CountingBlocks {
    /// Create a source with no allocation limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source that fails every allocation after the first `limit`.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Blocks currently handed out.
    pub fn live(&self) -> usize {
        self.live.lock().len()
    }

    /// Blocks handed out over the source's lifetime.
    pub fn total_allocated(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    /// Allocation requests refused because of the limit.
    pub fn refused(&self) -> usize {
        self.refused.load(Ordering::SeqCst)
    }

    /// Check that every block came back exactly once.
    pub fn all_returned(&self) -> bool {
        self.live() == 0 && self.foreign.load(Ordering::SeqCst) == 0
    }
}

impl BlockSource for CountingBlocks {
    fn allocate(&self, size: usize) -> Option<Block> {
        // Claim a slot under the limit in one atomic step.
        let claimed = self
            .allocated
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match self.limit {
                Some(limit) if n >= limit => None,
                _ => Some(n + 1),
            });
        if claimed.is_err() {
            self.refused.fetch_add(1, Ordering::SeqCst);
            return None;
        }

        let Some(block) = self.inner.allocate(size) else {
            self.allocated.fetch_sub(1, Ordering::SeqCst);
            return None;
        };
        self.live.lock().insert(block.as_ptr() as usize);
        Some(block)
    }

    fn deallocate(&self, block: Block) {
        if !self.live.lock().remove(&(block.as_ptr() as usize)) {
            // Not ours, or already returned; leak it rather than free twice.
            self.foreign.fetch_add(1, Ordering::SeqCst);
            return;
        }
        self.inner.deallocate(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_live_blocks() {
        let source = CountingBlocks::new();
        let a = source.allocate(64).unwrap();
        let b = source.allocate(64).unwrap();
        assert_eq!(source.live(), 2);
        assert!(!source.all_returned());

        source.deallocate(a);
        source.deallocate(b);
        assert_eq!(source.live(), 0);
        assert_eq!(source.total_allocated(), 2);
        assert!(source.all_returned());
    }

    #[test]
    fn limit_refuses_further_allocations() {
        let source = CountingBlocks::with_limit(1);
        let block = source.allocate(32).unwrap();
        assert!(source.allocate(32).is_none());
        assert_eq!(source.refused(), 1);
        source.deallocate(block);
    }

    #[test]
    fn limit_holds_under_concurrent_allocation() {
        let source = CountingBlocks::with_limit(20);

        let blocks: Vec<Block> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let source = &source;
                    s.spawn(move || (0..10).filter_map(|_| source.allocate(16)).collect::<Vec<_>>())
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|w| w.join().unwrap())
                .collect()
        });

        assert_eq!(blocks.len(), 20);
        assert_eq!(source.total_allocated(), 20);
        assert_eq!(source.refused(), 60);

        for block in blocks {
            source.deallocate(block);
        }
        assert!(source.all_returned());
    }

    #[test]
    fn failed_inner_allocation_is_not_counted() {
        let source = CountingBlocks::with_limit(1);
        assert!(source.allocate(usize::MAX).is_none());
        assert_eq!(source.total_allocated(), 0);
        let block = source.allocate(8).unwrap();
        source.deallocate(block);
    }

    #[test]
    fn foreign_blocks_are_flagged() {
        let source = CountingBlocks::new();
        let other = SystemBlocks::new().allocate(16).unwrap();
        let (ptr, len) = other.into_raw_parts();

        // SAFETY: the raw parts come straight from a live SystemBlocks block.
        source.deallocate(unsafe { Block::from_raw_parts(ptr, len) });
        assert!(!source.all_returned());

        // SAFETY: the block was not freed by the counting source.
        SystemBlocks::new().deallocate(unsafe { Block::from_raw_parts(ptr, len) });
    }
}
