//! Packed 8-byte handles to interned names.

use std::fmt;

/// Number of bits holding the in-arena byte offset.
pub const OFFSET_BITS: u32 = 56;

/// Number of bits holding the arena index.
pub const ARENA_BITS: u32 = u64::BITS - OFFSET_BITS;

/// Mask selecting the offset field of a packed handle.
pub const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;

/// Largest arena index a handle can carry.
pub const MAX_ARENA_INDEX: usize = (1 << ARENA_BITS) - 1;

/// Largest in-arena offset a handle can carry.
pub const MAX_OFFSET: u64 = OFFSET_MASK;

/// A handle to one interned name.
///
/// The low 56 bits hold the byte offset of the name's chunk inside its
/// arena, the high 8 bits hold the arena index. Two handles from the same
/// table are equal iff they refer to the same chunk, so comparing names is a
/// single `u64` comparison.
///
/// A handle is a weak reference: it borrows nothing and stays meaningful only
/// while the [`NameTable`](crate::NameTable) that produced it is alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Handle(u64);

impl Handle {
    /// The null handle. It never resolves to a name.
    ///
    /// Its bit pattern doubles as the end-of-chain marker in the hash index.
    pub const NULL: Self = Self(u64::MAX);

    /// Pack an arena index and an in-arena offset.
    ///
    /// Bits that do not fit their field are discarded.
    #[must_use]
    #[inline]
    pub const fn encode(arena: u8, offset: u64) -> Self {
        Self(((arena as u64) << OFFSET_BITS) | (offset & OFFSET_MASK))
    }

    /// Split the handle back into `(arena, offset)`.
    #[must_use]
    #[inline]
    pub const fn decode(self) -> (u8, u64) {
        (self.arena(), self.offset())
    }

    /// Arena index field.
    #[must_use]
    #[inline]
    pub const fn arena(self) -> u8 {
        (self.0 >> OFFSET_BITS) as u8
    }

    /// In-arena byte offset field.
    #[must_use]
    #[inline]
    pub const fn offset(self) -> u64 {
        self.0 & OFFSET_MASK
    }

    /// Raw packed value.
    #[must_use]
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from a raw packed value.
    #[must_use]
    #[inline]
    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    /// Check if this is the null handle.
    #[must_use]
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("Handle(null)");
        }
        f.debug_struct("Handle")
            .field("arena", &self.arena())
            .field("offset", &self.offset())
            .finish()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("null");
        }
        write!(f, "{}:0x{:06x}", self.arena(), self.offset())
    }
}

const _: () = assert!(std::mem::size_of::<Handle>() == std::mem::size_of::<u64>());
