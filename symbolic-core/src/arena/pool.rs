//! Bounded pool of bump-allocated arenas.

use super::chunk::{ChunkHeader, Entry, HASH_OFFSET, HEADER_SIZE, chunk_footprint, encode_chunk};
use crate::block::{BLOCK_ALIGN, Block, BlockSource};
use crate::config::{MAX_NAME_LENGTH, PoolConfig};
use crate::error::{Result, SymbolicError};
use crate::types::Handle;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Per-arena state visible to lock-free readers.
struct ArenaSlot {
    /// Base address of the arena block, null until the arena is opened.
    base: AtomicPtr<u8>,
    /// One bit per 8-byte slot, set once a chunk starting there is complete.
    starts: OnceLock<Box<[AtomicU64]>>,
}

impl ArenaSlot {
    fn new() -> Self {
        Self {
            base: AtomicPtr::new(std::ptr::null_mut()),
            starts: OnceLock::new(),
        }
    }
}

/// State guarded by the mutation lock.
struct ArenaState {
    /// Open arena blocks, in arena index order.
    blocks: Vec<Block>,
    /// Bytes used in the newest arena.
    fill: usize,
}

/// Owner of every arena block of a name table.
///
/// Readers resolve handles without locking. All allocation goes through an
/// [`ArenaWriter`], which holds the pool's single mutation lock.
pub struct ArenaPool {
    source: Arc<dyn BlockSource>,
    arena_size: usize,
    /// Words in each arena's chunk-start bitmap.
    bitmap_words: usize,
    slots: Box<[ArenaSlot]>,
    state: Mutex<ArenaState>,
    /// Number of open arenas.
    open: AtomicUsize,
    /// Bytes consumed by chunks across all arenas.
    used: AtomicUsize,
}

impl ArenaPool {
    /// Create an empty pool. No arena is opened yet.
    ///
    /// Fails with `InvalidConfig` if `config` does not validate, so every
    /// arena index the pool can open fits a handle.
    pub fn new(source: Arc<dyn BlockSource>, config: &PoolConfig) -> Result<Self> {
        config.validate()?;
        let slots = (0..config.max_arenas).map(|_| ArenaSlot::new()).collect();

        Ok(Self {
            source,
            arena_size: config.arena_size,
            bitmap_words: config.bookkeeping_per_arena() / 8,
            slots,
            state: Mutex::new(ArenaState {
                blocks: Vec::with_capacity(config.max_arenas),
                fill: 0,
            }),
            open: AtomicUsize::new(0),
            used: AtomicUsize::new(0),
        })
    }

    /// Acquire the mutation lock.
    pub fn writer(&self) -> ArenaWriter<'_> {
        ArenaWriter {
            pool: self,
            state: self.state.lock(),
        }
    }

    /// Size of every arena in bytes.
    pub fn arena_size(&self) -> usize {
        self.arena_size
    }

    /// Maximum number of arenas.
    pub fn max_arenas(&self) -> usize {
        self.slots.len()
    }

    /// Number of arenas opened so far.
    pub fn arena_count(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    /// Bytes taken by chunks, including alignment padding.
    pub fn bytes_used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    /// Resolve a handle to the chunk it names.
    ///
    /// Fails with `InvalidHandle` unless a complete chunk of this pool starts
    /// exactly at the handle's arena and offset.
    pub fn entry(&self, handle: Handle) -> Result<Entry<'_>> {
        let (arena, offset) = handle.decode();

        let slot = self.slots.get(arena as usize).ok_or_else(|| {
            invalid_handle(handle, format!("arena {arena} is beyond the pool limit"))
        })?;

        let base = slot.base.load(Ordering::Acquire);
        if base.is_null() {
            return Err(invalid_handle(handle, format!("arena {arena} is not open")));
        }

        let offset = usize::try_from(offset)
            .ok()
            .filter(|off| off % BLOCK_ALIGN == 0 && off + HEADER_SIZE <= self.arena_size)
            .ok_or_else(|| invalid_handle(handle, "offset is not a chunk boundary".to_string()))?;

        let starts = slot
            .starts
            .get()
            .ok_or_else(|| invalid_handle(handle, format!("arena {arena} is not open")))?;

        let bit = offset / BLOCK_ALIGN;
        let word = starts[bit / 64].load(Ordering::Acquire);
        if word & (1 << (bit % 64)) == 0 {
            return Err(invalid_handle(
                handle,
                "no chunk starts at this offset".to_string(),
            ));
        }

        // SAFETY: the start bit was published with Release after the chunk
        // was fully written, and the Acquire load above pairs with it. Chunk
        // header and data bytes are never written again; the link word is
        // only accessed atomically. The chunk lies inside the arena block,
        // which lives as long as the pool.
        unsafe {
            let chunk = base.add(offset);
            let link = &*(chunk as *const AtomicU64);
            let header_bytes = std::slice::from_raw_parts(chunk.add(HASH_OFFSET), 8);
            let header = ChunkHeader::read_from(header_bytes);
            let data = std::slice::from_raw_parts(
                chunk.add(HEADER_SIZE),
                header.length as usize + 1,
            );
            Ok(Entry::new(handle, header, link, data))
        }
    }
}

impl Drop for ArenaPool {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let released = state.blocks.len();

        for (slot, block) in self.slots.iter().zip(state.blocks.drain(..)) {
            slot.base.store(std::ptr::null_mut(), Ordering::Relaxed);
            self.source.deallocate(block);
        }

        tracing::debug!(arenas = released, "Released name arenas");
    }
}

fn invalid_handle(handle: Handle, cause: String) -> SymbolicError {
    SymbolicError::InvalidHandle { handle, cause }
}

/// Exclusive write access to an [`ArenaPool`].
///
/// Holding a writer means holding the table's mutation lock; the lock is
/// released when the writer is dropped.
pub struct ArenaWriter<'a> {
    pool: &'a ArenaPool,
    state: MutexGuard<'a, ArenaState>,
}

impl<'a> ArenaWriter<'a> {
    /// Pool this writer locks.
    pub fn pool(&self) -> &'a ArenaPool {
        self.pool
    }

    /// Open a fresh, zeroed arena and make it the current one.
    ///
    /// Returns the new arena's index.
    pub fn open_arena(&mut self) -> Result<usize> {
        let pool = self.pool;
        let index = self.state.blocks.len();

        if index >= pool.slots.len() {
            tracing::warn!(max_arenas = pool.slots.len(), "Name arenas exhausted");
            return Err(SymbolicError::ArenaExhausted {
                max_arenas: pool.slots.len(),
            });
        }

        let size = pool.arena_size;
        let block = match pool.source.allocate(size) {
            Some(block) if block.len() >= size && block.is_aligned() => block,
            Some(block) => {
                tracing::warn!(
                    requested = size,
                    received = block.len(),
                    aligned = block.is_aligned(),
                    "Block source returned an unusable block"
                );
                pool.source.deallocate(block);
                return Err(SymbolicError::AllocationFailure { size });
            }
            None => {
                tracing::warn!(size, "Failed to allocate a name arena");
                return Err(SymbolicError::AllocationFailure { size });
            }
        };

        // SAFETY: the block is at least `size` writable bytes and no reader
        // can reach it before `base` is published below.
        unsafe { std::ptr::write_bytes(block.as_ptr(), 0, size) };

        let slot = &pool.slots[index];
        let words = (0..pool.bitmap_words).map(|_| AtomicU64::new(0)).collect();
        if slot.starts.set(words).is_err() {
            pool.source.deallocate(block);
            return Err(SymbolicError::AllocationFailure { size });
        }
        slot.base.store(block.as_ptr(), Ordering::Release);

        self.state.blocks.push(block);
        self.state.fill = 0;
        pool.open.store(index + 1, Ordering::Release);

        tracing::debug!(arena = index, size, "Opened name arena");
        Ok(index)
    }

    /// Reserve `size` bytes in the current arena, opening a new arena when
    /// the current one cannot fit them.
    ///
    /// Returns the arena index and offset of the reserved region.
    pub fn reserve(&mut self, size: usize) -> Result<(usize, usize)> {
        debug_assert_eq!(size % BLOCK_ALIGN, 0);

        if size > self.pool.arena_size {
            return Err(SymbolicError::InvalidInput {
                length: size,
                cause: format!(
                    "chunk of {size} bytes cannot fit an arena of {} bytes",
                    self.pool.arena_size
                ),
            });
        }

        if self.state.blocks.is_empty() || self.state.fill + size > self.pool.arena_size {
            self.open_arena()?;
        }

        let arena = self.state.blocks.len() - 1;
        let offset = self.state.fill;
        self.state.fill += size;
        self.pool.used.fetch_add(size, Ordering::Relaxed);

        Ok((arena, offset))
    }

    /// Write a new chunk for `data` and return its handle.
    ///
    /// The chunk is complete and resolvable when this returns, but it is not
    /// linked into any bucket.
    pub fn write_chunk(&mut self, data: &[u8], hash: u32) -> Result<Handle> {
        if data.len() >= MAX_NAME_LENGTH {
            return Err(SymbolicError::InvalidInput {
                length: data.len(),
                cause: format!("chunk data must be shorter than {MAX_NAME_LENGTH} bytes"),
            });
        }

        let footprint = chunk_footprint(data.len());
        let (arena, offset) = self.reserve(footprint)?;

        let header = ChunkHeader {
            hash,
            length: data.len() as u16,
            arena_id: arena as u16,
            flags: 0,
        };

        let block = &self.state.blocks[arena];
        // SAFETY: the region was just reserved under the mutation lock, lies
        // inside the block, and its start bit is still clear, so no other
        // reference to these bytes exists.
        let buf = unsafe { std::slice::from_raw_parts_mut(block.as_ptr().add(offset), footprint) };
        encode_chunk(buf, &header, data);

        let bit = offset / BLOCK_ALIGN;
        if let Some(starts) = self.pool.slots[arena].starts.get() {
            starts[bit / 64].fetch_or(1 << (bit % 64), Ordering::Release);
        }

        Ok(Handle::encode(arena as u8, offset as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::SystemBlocks;
    use crate::testing::CountingBlocks;

    fn small_config() -> PoolConfig {
        PoolConfig::default()
            .with_max_name_length(32)
            .with_arena_size(256)
            .with_max_arenas(4)
            .with_hash_buckets(16)
    }

    #[test]
    fn pool_starts_empty() {
        let pool = ArenaPool::new(Arc::new(SystemBlocks), &small_config()).unwrap();
        assert_eq!(pool.arena_count(), 0);
        assert_eq!(pool.bytes_used(), 0);
        assert!(pool.entry(Handle::encode(0, 0)).is_err());
    }

    #[test]
    fn written_chunk_resolves() {
        let pool = ArenaPool::new(Arc::new(SystemBlocks), &small_config()).unwrap();
        let handle = pool.writer().write_chunk(b"Spine_02", 99).unwrap();

        assert_eq!(handle, Handle::encode(0, 0));
        let entry = pool.entry(handle).unwrap();
        assert_eq!(entry.content(), "Spine_02");
        assert_eq!(entry.hash(), 99);
        assert_eq!(entry.arena_id(), 0);
        assert_eq!(entry.flags(), 0);
        assert_eq!(entry.next(), None);
        assert_eq!(pool.bytes_used(), chunk_footprint(8));
    }

    #[test]
    fn chunks_are_bump_allocated() {
        let pool = ArenaPool::new(Arc::new(SystemBlocks), &small_config()).unwrap();
        let mut writer = pool.writer();
        let a = writer.write_chunk(b"a", 1).unwrap();
        let b = writer.write_chunk(b"bb", 2).unwrap();
        drop(writer);

        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), chunk_footprint(1) as u64);
        assert_eq!(pool.entry(b).unwrap().content(), "bb");
    }

    #[test]
    fn full_arena_opens_next_one() {
        let pool = ArenaPool::new(Arc::new(SystemBlocks), &small_config()).unwrap();
        let mut writer = pool.writer();

        // 31-byte names take 48 bytes; five fit a 256-byte arena.
        let name = [b'x'; 31];
        let handles: Vec<_> = (0..6)
            .map(|i| writer.write_chunk(&name, i).unwrap())
            .collect();
        drop(writer);

        assert_eq!(pool.arena_count(), 2);
        assert_eq!(handles[4].arena(), 0);
        assert_eq!(handles[5].arena(), 1);
        assert_eq!(handles[5].offset(), 0);

        let entry = pool.entry(handles[5]).unwrap();
        assert_eq!(entry.arena_id(), 1);
        assert_eq!(entry.hash(), 5);
    }

    #[test]
    fn exhaustion_is_reported() {
        let config = small_config().with_max_arenas(1);
        let pool = ArenaPool::new(Arc::new(SystemBlocks), &config).unwrap();
        let mut writer = pool.writer();
        writer.open_arena().unwrap();

        let err = writer.open_arena().unwrap_err();
        assert_eq!(err, SymbolicError::ArenaExhausted { max_arenas: 1 });
        assert_eq!(pool.arena_count(), 1);
    }

    #[test]
    fn allocation_failure_is_reported() {
        let source = Arc::new(CountingBlocks::with_limit(0));
        let pool = ArenaPool::new(source.clone(), &small_config()).unwrap();

        let err = pool.writer().write_chunk(b"a", 0).unwrap_err();
        assert_eq!(err, SymbolicError::AllocationFailure { size: 256 });
        assert_eq!(pool.arena_count(), 0);
        assert_eq!(source.live(), 0);
    }

    #[test]
    fn misplaced_handles_are_rejected() {
        let pool = ArenaPool::new(Arc::new(SystemBlocks), &small_config()).unwrap();
        let handle = pool.writer().write_chunk(b"Clavicle", 7).unwrap();

        // Inside the chunk, but not at its start.
        assert!(pool.entry(Handle::encode(0, handle.offset() + 8)).is_err());
        // Unaligned.
        assert!(pool.entry(Handle::encode(0, 3)).is_err());
        // Past the arena.
        assert!(pool.entry(Handle::encode(0, 4096)).is_err());
        // Arena not open, and arena beyond the limit.
        assert!(pool.entry(Handle::encode(1, 0)).is_err());
        assert!(pool.entry(Handle::encode(9, 0)).is_err());
        assert!(pool.entry(Handle::NULL).is_err());
    }

    #[test]
    fn drop_returns_every_block() {
        let source = Arc::new(CountingBlocks::new());
        {
            let pool = ArenaPool::new(source.clone(), &small_config()).unwrap();
            let mut writer = pool.writer();
            writer.open_arena().unwrap();
            writer.open_arena().unwrap();
            writer.open_arena().unwrap();
            assert_eq!(source.live(), 3);
        }
        assert_eq!(source.live(), 0);
        assert_eq!(source.total_allocated(), 3);
    }

    #[test]
    fn arena_limit_beyond_handle_range_is_rejected() {
        // Arena 256 would wrap to arena 0 in an 8-bit handle field.
        let config = small_config().with_max_arenas(300);
        let err = ArenaPool::new(Arc::new(SystemBlocks), &config).err().unwrap();
        assert!(matches!(
            err,
            SymbolicError::InvalidConfig {
                field: "max_arenas",
                ..
            }
        ));

        let config = small_config().with_max_arenas(256);
        assert_eq!(ArenaPool::new(Arc::new(SystemBlocks), &config).unwrap().max_arenas(), 256);
    }

    #[test]
    fn bitmap_covers_every_slot() {
        let pool = ArenaPool::new(Arc::new(SystemBlocks), &small_config()).unwrap();
        let mut writer = pool.writer();
        let name = [b'z'; 7];
        let mut last = Handle::NULL;
        while writer.pool().arena_count() < 2 {
            last = writer.write_chunk(&name, 0).unwrap();
        }
        drop(writer);

        // The last 24-byte slot of a 256-byte arena starts at 216.
        assert_eq!(pool.entry(Handle::encode(0, 216)).unwrap().content(), "zzzzzzz");
        assert_eq!(last, Handle::encode(1, 0));
    }

    #[test]
    fn undersized_arena_is_rejected() {
        let config = small_config().with_arena_size(32);
        assert!(ArenaPool::new(Arc::new(SystemBlocks), &config).is_err());
    }

    #[test]
    fn overlong_chunk_data_is_rejected() {
        let pool = ArenaPool::new(Arc::new(SystemBlocks), &PoolConfig::compact()).unwrap();
        let err = pool.writer().write_chunk(&[b'a'; 512], 0).unwrap_err();
        assert!(matches!(err, SymbolicError::InvalidInput { length: 512, .. }));
        assert_eq!(pool.bytes_used(), 0);
    }

    #[test]
    fn oversized_reservation_is_rejected() {
        let pool = ArenaPool::new(Arc::new(SystemBlocks), &small_config()).unwrap();
        let err = pool.writer().reserve(512).unwrap_err();
        assert!(matches!(err, SymbolicError::InvalidInput { .. }));
    }
}
