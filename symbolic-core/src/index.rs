//! Hash index of chained buckets.
//!
//! A fixed array of chain heads; each bucket holds a singly linked chain of
//! chunks threaded through their atomic link words. Chains only ever grow at
//! the tail, so a lock-free reader always sees a prefix of the final chain.

use crate::arena::{ArenaPool, ArenaWriter, END_OF_CHAIN, Entry};
use crate::error::{Result, SymbolicError};
use crate::types::Handle;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of a chain scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// An entry matched.
    Found(Handle),
    /// No entry matched; `tail` is the last entry visited, if any.
    Missing {
        /// Last chain entry seen by the scan.
        tail: Option<Handle>,
    },
}

/// Fixed-size array of bucket chain heads.
pub struct HashIndex {
    heads: Box<[AtomicU64]>,
    mask: usize,
}

impl HashIndex {
    /// Create an index of `buckets` empty chains.
    ///
    /// Fails with `InvalidConfig` unless `buckets` is a non-zero power of two.
    pub fn new(buckets: usize) -> Result<Self> {
        if !buckets.is_power_of_two() {
            return Err(SymbolicError::InvalidConfig {
                field: "hash_buckets",
                cause: format!("must be a non-zero power of two, got {buckets}"),
            });
        }

        let heads = (0..buckets).map(|_| AtomicU64::new(END_OF_CHAIN)).collect();
        Ok(Self {
            heads,
            mask: buckets - 1,
        })
    }

    /// Number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.heads.len()
    }

    /// Bucket a hash routes to.
    #[inline]
    pub fn bucket_for(&self, hash: u32) -> usize {
        hash as usize & self.mask
    }

    /// First entry of a bucket's chain.
    pub fn head(&self, bucket: usize) -> Option<Handle> {
        let raw = self.heads[bucket].load(Ordering::Acquire);
        (raw != END_OF_CHAIN).then(|| Handle::from_u64(raw))
    }

    /// Walk a chain in insertion order until `matches` accepts an entry.
    ///
    /// With `after` set, the walk starts at the entry following that handle
    /// instead of at the head; `after` must belong to this bucket's chain.
    pub fn scan<F>(
        &self,
        arenas: &ArenaPool,
        bucket: usize,
        after: Option<Handle>,
        mut matches: F,
    ) -> Result<Lookup>
    where
        F: FnMut(&Entry<'_>) -> bool,
    {
        let mut tail = after;
        let mut cursor = match after {
            Some(handle) => arenas.entry(handle)?.next(),
            None => self.head(bucket),
        };

        while let Some(handle) = cursor {
            let entry = arenas.entry(handle)?;
            if matches(&entry) {
                return Ok(Lookup::Found(handle));
            }
            tail = Some(handle);
            cursor = entry.next();
        }

        Ok(Lookup::Missing { tail })
    }

    /// Find the first entry in a bucket whose stored hash equals `hash`.
    pub fn lookup(&self, arenas: &ArenaPool, bucket: usize, hash: u32) -> Result<Option<Handle>> {
        match self.scan(arenas, bucket, None, |entry| entry.hash() == hash)? {
            Lookup::Found(handle) => Ok(Some(handle)),
            Lookup::Missing { .. } => Ok(None),
        }
    }

    /// Link `handle` after `tail`, or make it the head when `tail` is `None`.
    ///
    /// `tail` must be the current last entry of the bucket. The writer proves
    /// the mutation lock is held.
    pub fn link_after(
        &self,
        writer: &ArenaWriter<'_>,
        bucket: usize,
        tail: Option<Handle>,
        handle: Handle,
    ) -> Result<()> {
        match tail {
            None => {
                debug_assert!(self.head(bucket).is_none());
                self.heads[bucket].store(handle.as_u64(), Ordering::Release);
            }
            Some(tail) => {
                let entry = writer.pool().entry(tail)?;
                debug_assert!(entry.next().is_none());
                entry.link().store(handle.as_u64(), Ordering::Release);
            }
        }
        Ok(())
    }

    /// Append `handle` at the end of a bucket's chain.
    pub fn append(&self, writer: &ArenaWriter<'_>, bucket: usize, handle: Handle) -> Result<()> {
        let tail = match self.scan(writer.pool(), bucket, None, |_| false)? {
            Lookup::Missing { tail } => tail,
            Lookup::Found(_) => unreachable!("scan without a predicate never matches"),
        };
        self.link_after(writer, bucket, tail, handle)
    }
}
