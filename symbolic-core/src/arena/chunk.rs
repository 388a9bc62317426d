//! Chunk layout and header codec.

use crate::block::BLOCK_ALIGN;
use crate::types::Handle;
use byteorder::{ByteOrder, LittleEndian};
use std::ffi::CStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Byte offset of the atomic chain link inside a chunk.
pub const LINK_OFFSET: usize = 0;

/// Byte offset of the 32-bit hash inside a chunk.
pub const HASH_OFFSET: usize = 8;

/// Byte offset of the packed length/arena/flags word inside a chunk.
pub const META_OFFSET: usize = 12;

/// Size of the fixed chunk header; name bytes start here.
pub const HEADER_SIZE: usize = 16;

/// Raw link value terminating a chain.
pub const END_OF_CHAIN: u64 = Handle::NULL.as_u64();

const LENGTH_BITS: u32 = 9;
const ARENA_ID_BITS: u32 = 16;
const FLAGS_BITS: u32 = 7;

const LENGTH_MASK: u32 = (1 << LENGTH_BITS) - 1;
const ARENA_ID_MASK: u32 = (1 << ARENA_ID_BITS) - 1;
const FLAGS_MASK: u32 = (1 << FLAGS_BITS) - 1;

const ARENA_ID_SHIFT: u32 = LENGTH_BITS;
const FLAGS_SHIFT: u32 = LENGTH_BITS + ARENA_ID_BITS;

const _: () = assert!(LENGTH_BITS + ARENA_ID_BITS + FLAGS_BITS == 32);

/// Bytes a chunk holding `length` name bytes occupies in its arena,
/// including the NUL terminator and alignment padding.
#[must_use]
pub const fn chunk_footprint(length: usize) -> usize {
    let raw = HEADER_SIZE + length + 1;
    (raw + BLOCK_ALIGN - 1) & !(BLOCK_ALIGN - 1)
}

/// Immutable header fields of a chunk.
///
/// Layout, little-endian except for the link, which is a native atomic:
///
/// ```text
/// [0..8)   next   u64  atomic link to the next chunk in the bucket
/// [8..12)  hash   u32  case-insensitive hash of the name
/// [12..16) meta   u32  length:9 | arena_id:16 | flags:7
/// [16..)   data        name bytes followed by NUL
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Case-insensitive hash of the name.
    pub hash: u32,
    /// Name length in bytes.
    pub length: u16,
    /// Index of the arena holding the chunk.
    pub arena_id: u16,
    /// Reserved flag bits.
    pub flags: u8,
}

impl ChunkHeader {
    /// Pack the length, arena id and flags into the meta word.
    ///
    /// Values wider than their field are truncated.
    #[must_use]
    pub const fn meta(&self) -> u32 {
        (self.length as u32 & LENGTH_MASK)
            | ((self.arena_id as u32 & ARENA_ID_MASK) << ARENA_ID_SHIFT)
            | ((self.flags as u32 & FLAGS_MASK) << FLAGS_SHIFT)
    }

    /// Unpack a header from its hash and meta word.
    #[must_use]
    pub const fn from_parts(hash: u32, meta: u32) -> Self {
        Self {
            hash,
            length: (meta & LENGTH_MASK) as u16,
            arena_id: ((meta >> ARENA_ID_SHIFT) & ARENA_ID_MASK) as u16,
            flags: ((meta >> FLAGS_SHIFT) & FLAGS_MASK) as u8,
        }
    }

    /// Write the hash and meta word into `buf[HASH_OFFSET..HEADER_SIZE]`.
    pub fn write_to(&self, buf: &mut [u8]) {
        LittleEndian::write_u32(&mut buf[HASH_OFFSET..META_OFFSET], self.hash);
        LittleEndian::write_u32(&mut buf[META_OFFSET..HEADER_SIZE], self.meta());
    }

    /// Read the header from the 8 bytes following the link word.
    pub fn read_from(buf: &[u8]) -> Self {
        let hash = LittleEndian::read_u32(&buf[0..4]);
        let meta = LittleEndian::read_u32(&buf[4..8]);
        Self::from_parts(hash, meta)
    }
}

/// Encode a complete chunk into `buf`, which must be exactly
/// `chunk_footprint(data.len())` bytes long.
///
/// The link word is set to [`END_OF_CHAIN`] and padding is zeroed.
pub fn encode_chunk(buf: &mut [u8], header: &ChunkHeader, data: &[u8]) {
    debug_assert_eq!(buf.len(), chunk_footprint(data.len()));
    buf[LINK_OFFSET..HASH_OFFSET].copy_from_slice(&END_OF_CHAIN.to_ne_bytes());
    header.write_to(buf);
    let end = HEADER_SIZE + data.len();
    buf[HEADER_SIZE..end].copy_from_slice(data);
    buf[end..].fill(0);
}

/// Borrowed view of one interned name inside the table.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    handle: Handle,
    header: ChunkHeader,
    link: &'a AtomicU64,
    /// Name bytes including the NUL terminator.
    data: &'a [u8],
}

impl<'a> Entry<'a> {
    pub(crate) fn new(
        handle: Handle,
        header: ChunkHeader,
        link: &'a AtomicU64,
        data: &'a [u8],
    ) -> Self {
        debug_assert_eq!(data.len(), header.length as usize + 1);
        Self {
            handle,
            header,
            link,
            data,
        }
    }

    /// Handle this entry was resolved from.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Stored name, in the casing of the call that first interned it.
    pub fn content(&self) -> &'a str {
        // Chunks only ever hold validated ASCII, which is always UTF-8.
        std::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }

    /// Stored name bytes without the terminator.
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.data[..self.data.len() - 1]
    }

    /// Stored name as a NUL-terminated C string.
    ///
    /// Returns `None` if the name itself contains a NUL byte.
    pub fn as_c_str(&self) -> Option<&'a CStr> {
        CStr::from_bytes_with_nul(self.data).ok()
    }

    /// Name length in bytes.
    pub fn len(&self) -> usize {
        self.header.length as usize
    }

    /// Check if the name is the empty string.
    pub fn is_empty(&self) -> bool {
        self.header.length == 0
    }

    /// Case-insensitive hash of the name.
    pub fn hash(&self) -> u32 {
        self.header.hash
    }

    /// Reserved flag bits.
    pub fn flags(&self) -> u8 {
        self.header.flags
    }

    /// Index of the arena holding this entry.
    pub fn arena_id(&self) -> u16 {
        self.header.arena_id
    }

    /// Next entry in the same hash bucket, if any.
    pub fn next(&self) -> Option<Handle> {
        let raw = self.link.load(Ordering::Acquire);
        (raw != END_OF_CHAIN).then(|| Handle::from_u64(raw))
    }

    pub(crate) fn link(&self) -> &'a AtomicU64 {
        self.link
    }
}
