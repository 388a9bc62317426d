//! Name table configuration.

use crate::arena::chunk_footprint;
use crate::block::BLOCK_ALIGN;
use crate::error::{Result, SymbolicError};
use crate::types::{MAX_ARENA_INDEX, MAX_OFFSET};
use serde::{Deserialize, Serialize};

/// Exclusive upper bound on name length in bytes.
///
/// The chunk header stores the length in 9 bits, so no configuration may
/// raise the bound above this.
pub const MAX_NAME_LENGTH: usize = 512;

/// Default arena size: 2 MB.
pub const DEFAULT_ARENA_SIZE: usize = 2 * 1024 * 1024;

/// Default number of arenas a table may open.
pub const DEFAULT_MAX_ARENAS: usize = 32;

/// Hard limit on arenas, set by the width of the handle's arena field.
pub const MAX_ARENAS: usize = MAX_ARENA_INDEX + 1;

/// Default number of hash buckets.
pub const DEFAULT_HASH_BUCKETS: usize = 0x10000;

/// Configuration for name table creation.
///
/// The defaults bound the table at 64 MB of name storage
/// (`max_arenas * arena_size`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Exclusive upper bound on the byte length of an interned name.
    pub max_name_length: usize,
    /// Size in bytes of every arena block.
    pub arena_size: usize,
    /// Maximum number of arenas the table may open.
    pub max_arenas: usize,
    /// Number of hash buckets. Must be a power of two.
    pub hash_buckets: usize,
    /// Whether a hash match must also match the stored text.
    ///
    /// When false, two names whose case-insensitive hashes collide are
    /// treated as the same name.
    pub compare_content: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_name_length: MAX_NAME_LENGTH,
            arena_size: DEFAULT_ARENA_SIZE,
            max_arenas: DEFAULT_MAX_ARENAS,
            hash_buckets: DEFAULT_HASH_BUCKETS,
            compare_content: true,
        }
    }
}

impl PoolConfig {
    /// Create a small configuration for tests and tools.
    ///
    /// 64 KB arenas, 1024 buckets.
    pub fn compact() -> Self {
        Self {
            arena_size: 64 * 1024,
            hash_buckets: 1024,
            ..Self::default()
        }
    }

    /// Set the exclusive name length bound.
    pub fn with_max_name_length(mut self, length: usize) -> Self {
        self.max_name_length = length;
        self
    }

    /// Set the arena size.
    pub fn with_arena_size(mut self, size: usize) -> Self {
        self.arena_size = size;
        self
    }

    /// Set the arena limit.
    pub fn with_max_arenas(mut self, count: usize) -> Self {
        self.max_arenas = count;
        self
    }

    /// Set the bucket count.
    pub fn with_hash_buckets(mut self, buckets: usize) -> Self {
        self.hash_buckets = buckets;
        self
    }

    /// Choose between content and hash-only identity.
    pub fn with_content_comparison(mut self, enabled: bool) -> Self {
        self.compare_content = enabled;
        self
    }

    /// Total bytes of name storage the table may ever draw from its block
    /// source.
    ///
    /// Bookkeeping lives outside this budget and comes from the global
    /// allocator: the hash index (8 bytes per bucket) and, per open arena, a
    /// chunk-start bitmap of [`bookkeeping_per_arena`](Self::bookkeeping_per_arena) bytes.
    pub fn capacity(&self) -> usize {
        self.arena_size.saturating_mul(self.max_arenas)
    }

    /// Bytes of chunk-start bitmap kept per open arena, one bit per
    /// 8-byte slot rounded up to whole 64-bit words.
    pub fn bookkeeping_per_arena(&self) -> usize {
        self.arena_size.div_ceil(BLOCK_ALIGN).div_ceil(64) * 8
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<()> {
        if self.max_name_length == 0 || self.max_name_length > MAX_NAME_LENGTH {
            return Err(invalid(
                "max_name_length",
                format!("must be within 1..={MAX_NAME_LENGTH}, got {}", self.max_name_length),
            ));
        }

        if self.max_arenas == 0 || self.max_arenas > MAX_ARENAS {
            return Err(invalid(
                "max_arenas",
                format!("must be within 1..={MAX_ARENAS}, got {}", self.max_arenas),
            ));
        }

        if !self.hash_buckets.is_power_of_two() {
            return Err(invalid(
                "hash_buckets",
                format!("must be a non-zero power of two, got {}", self.hash_buckets),
            ));
        }

        if self.hash_buckets as u64 > 1u64 << 32 {
            return Err(invalid(
                "hash_buckets",
                format!("cannot exceed the 32-bit hash space, got {}", self.hash_buckets),
            ));
        }

        let largest_chunk = chunk_footprint(self.max_name_length - 1);
        if self.arena_size < largest_chunk {
            return Err(invalid(
                "arena_size",
                format!(
                    "{} bytes cannot hold a maximum-length chunk of {} bytes",
                    self.arena_size, largest_chunk
                ),
            ));
        }

        if self.arena_size as u64 > MAX_OFFSET {
            return Err(invalid(
                "arena_size",
                format!("{} bytes exceeds the handle offset range", self.arena_size),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, cause: String) -> SymbolicError {
    SymbolicError::InvalidConfig { field, cause }
}
