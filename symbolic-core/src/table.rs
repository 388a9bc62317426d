//! The name table: interning engine over the arena pool and hash index.
//!
//! Lookups walk bucket chains without locking. Insertions take the pool's
//! single mutation lock, write a chunk, and publish it by linking it at the
//! tail of its bucket chain.

use crate::arena::{ArenaPool, ArenaWriter, Entry};
use crate::block::{BlockSource, SystemBlocks};
use crate::config::PoolConfig;
use crate::error::{Result, SymbolicError};
use crate::hash::{hash_ascii_ci, validate_name};
use crate::index::{HashIndex, Lookup};
use crate::types::Handle;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Snapshot of table usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Interned names.
    pub names: usize,
    /// Open arenas.
    pub arenas: usize,
    /// Bytes taken by chunks.
    pub bytes_used: usize,
    /// Upper bound on bytes the table may ever allocate.
    pub capacity: usize,
}

/// Validated text with its hash and bucket.
struct Query<'t> {
    text: &'t str,
    hash: u32,
    bucket: usize,
}

/// Interns ASCII names into case-insensitive [`Handle`]s.
///
/// A table owns every arena it allocates and returns them all to its block
/// source when dropped. Handles are only meaningful to the table that
/// produced them.
pub struct NameTable {
    config: PoolConfig,
    arenas: ArenaPool,
    index: HashIndex,
    names: AtomicUsize,
}

impl NameTable {
    /// Create a table drawing arenas from `source`.
    ///
    /// The configuration is validated and the first arena is opened
    /// immediately, so a table that constructs can always intern a name.
    pub fn new(config: PoolConfig, source: Arc<dyn BlockSource>) -> Result<Self> {
        let arenas = ArenaPool::new(source, &config)?;
        let index = HashIndex::new(config.hash_buckets)?;
        arenas.writer().open_arena()?;

        tracing::debug!(
            arena_size = config.arena_size,
            max_arenas = config.max_arenas,
            hash_buckets = config.hash_buckets,
            compare_content = config.compare_content,
            "Created name table"
        );

        Ok(Self {
            config,
            arenas,
            index,
            names: AtomicUsize::new(0),
        })
    }

    /// Create a table backed by the global allocator.
    pub fn with_system_blocks(config: PoolConfig) -> Result<Self> {
        Self::new(config, Arc::new(SystemBlocks))
    }

    /// Intern a name the caller knows to be absent.
    ///
    /// Fails with `DuplicateName` if an equal name is already interned.
    pub fn add(&self, text: &str) -> Result<Handle> {
        let query = self.prepare(text)?;
        let mut writer = self.arenas.writer();

        match self.scan(&query, None)? {
            Lookup::Found(existing) => Err(SymbolicError::DuplicateName {
                name: text.to_string(),
                existing,
            }),
            Lookup::Missing { tail } => self.insert(&mut writer, &query, tail),
        }
    }

    /// Look up a name the caller knows to be present.
    ///
    /// Never locks. Fails with `NameNotFound` if the name was never interned.
    pub fn find(&self, text: &str) -> Result<Handle> {
        self.get(text)?.ok_or_else(|| SymbolicError::NameNotFound {
            name: text.to_string(),
        })
    }

    /// Look up a name, returning `None` when it is not interned.
    pub fn get(&self, text: &str) -> Result<Option<Handle>> {
        let query = self.prepare(text)?;
        match self.scan(&query, None)? {
            Lookup::Found(handle) => Ok(Some(handle)),
            Lookup::Missing { .. } => Ok(None),
        }
    }

    /// Check if a name is interned.
    pub fn contains(&self, text: &str) -> Result<bool> {
        Ok(self.get(text)?.is_some())
    }

    /// Return the handle of a name, interning it first if needed.
    ///
    /// A hit never locks. On a miss the lock is taken and only the part of
    /// the chain appended since the lock-free scan is checked again.
    pub fn find_or_add(&self, text: &str) -> Result<Handle> {
        let query = self.prepare(text)?;

        let seen = match self.scan(&query, None)? {
            Lookup::Found(handle) => return Ok(handle),
            Lookup::Missing { tail } => tail,
        };

        let mut writer = self.arenas.writer();
        match self.scan(&query, seen)? {
            Lookup::Found(handle) => Ok(handle),
            Lookup::Missing { tail } => self.insert(&mut writer, &query, tail),
        }
    }

    /// Resolve a handle to a borrowed view of its entry.
    pub fn entry(&self, handle: Handle) -> Result<Entry<'_>> {
        self.arenas.entry(handle)
    }

    /// Stored text of a name, in the casing it was first interned with.
    pub fn content(&self, handle: Handle) -> Result<&str> {
        Ok(self.entry(handle)?.content())
    }

    /// Byte length of a name.
    pub fn length(&self, handle: Handle) -> Result<usize> {
        Ok(self.entry(handle)?.len())
    }

    /// Case-insensitive hash of a name.
    pub fn hash(&self, handle: Handle) -> Result<u32> {
        Ok(self.entry(handle)?.hash())
    }

    /// Reserved flag bits of a name.
    pub fn flags(&self, handle: Handle) -> Result<u8> {
        Ok(self.entry(handle)?.flags())
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.names.load(Ordering::Relaxed)
    }

    /// Check if no name has been interned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of open arenas.
    pub fn arena_count(&self) -> usize {
        self.arenas.arena_count()
    }

    /// Current usage snapshot.
    pub fn stats(&self) -> TableStats {
        TableStats {
            names: self.len(),
            arenas: self.arena_count(),
            bytes_used: self.arenas.bytes_used(),
            capacity: self.config.capacity(),
        }
    }

    /// Configuration the table was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn prepare<'t>(&self, text: &'t str) -> Result<Query<'t>> {
        validate_name(text, self.config.max_name_length)?;
        let hash = hash_ascii_ci(text.as_bytes());
        Ok(Query {
            text,
            hash,
            bucket: self.index.bucket_for(hash),
        })
    }

    fn matches(&self, query: &Query<'_>, entry: &Entry<'_>) -> bool {
        entry.hash() == query.hash
            && (!self.config.compare_content
                || entry.as_bytes().eq_ignore_ascii_case(query.text.as_bytes()))
    }

    fn scan(&self, query: &Query<'_>, after: Option<Handle>) -> Result<Lookup> {
        self.index
            .scan(&self.arenas, query.bucket, after, |entry| self.matches(query, entry))
    }

    /// Write and link a new chunk. `tail` is the bucket's current last entry.
    fn insert(
        &self,
        writer: &mut ArenaWriter<'_>,
        query: &Query<'_>,
        tail: Option<Handle>,
    ) -> Result<Handle> {
        let handle = writer.write_chunk(query.text.as_bytes(), query.hash)?;
        self.index.link_after(writer, query.bucket, tail, handle)?;
        self.names.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(
            handle = %handle,
            bucket = query.bucket,
            name = query.text,
            "Interned name"
        );
        Ok(handle)
    }
}

impl fmt::Debug for NameTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameTable")
            .field("names", &self.len())
            .field("arenas", &self.arena_count())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> NameTable {
        NameTable::with_system_blocks(PoolConfig::compact()).unwrap()
    }

    #[test]
    fn add_then_content() {
        let table = table();
        let a = table.add("joint_01a").unwrap();
        assert_eq!(table.content(a).unwrap(), "joint_01a");
        assert_eq!(table.length(a).unwrap(), 9);
        assert_eq!(table.hash(a).unwrap(), hash_ascii_ci(b"joint_01a"));
        assert_eq!(table.flags(a).unwrap(), 0);
    }

    #[test]
    fn find_returns_added_handle() {
        let table = table();
        let a = table.add("joint_01a").unwrap();
        let b = table.add("sfx/charge/heavy_footstep").unwrap();

        assert_eq!(table.find("joint_01a").unwrap(), a);
        assert_eq!(table.find("sfx/charge/heavy_footstep").unwrap(), b);
        assert_ne!(a, b);
    }

    #[test]
    fn find_or_add_is_case_insensitive() {
        let table = table();
        let b = table.find_or_add("joint_09d").unwrap();
        assert_eq!(table.find_or_add("Joint_09D").unwrap(), b);
        assert_eq!(table.content(b).unwrap(), "joint_09d");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn find_unregistered_fails() {
        let table = table();
        let err = table.find("unregistered_name").unwrap_err();
        assert_eq!(
            err,
            SymbolicError::NameNotFound {
                name: "unregistered_name".to_string()
            }
        );
        assert_eq!(table.get("unregistered_name").unwrap(), None);
        assert!(!table.contains("unregistered_name").unwrap());
    }

    #[test]
    fn add_twice_fails() {
        let table = table();
        let a = table.add("joint_01a").unwrap();
        let err = table.add("JOINT_01A").unwrap_err();
        assert_eq!(
            err,
            SymbolicError::DuplicateName {
                name: "JOINT_01A".to_string(),
                existing: a,
            }
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn overlong_input_is_rejected_before_allocating() {
        let table = table();
        let before = table.stats();

        let err = table.add(&"n".repeat(512)).unwrap_err();
        assert!(matches!(err, SymbolicError::InvalidInput { length: 512, .. }));
        assert!(table.find_or_add("caf\u{e9}").is_err());
        assert!(table.find(&"n".repeat(600)).is_err());

        assert_eq!(table.stats(), before);
    }

    #[test]
    fn empty_name_is_internable() {
        let table = table();
        let empty = table.find_or_add("").unwrap();
        assert!(table.entry(empty).unwrap().is_empty());
        assert_eq!(table.content(empty).unwrap(), "");
        assert_eq!(table.find("").unwrap(), empty);
    }

    #[test]
    fn longest_name_is_internable() {
        let table = table();
        let text = "q".repeat(511);
        let handle = table.add(&text).unwrap();
        assert_eq!(table.content(handle).unwrap(), text);
        assert_eq!(table.length(handle).unwrap(), 511);
    }

    #[test]
    fn entry_exposes_c_string() {
        let table = table();
        let handle = table.add("Hips").unwrap();
        let entry = table.entry(handle).unwrap();
        assert_eq!(entry.handle(), handle);
        assert_eq!(entry.as_c_str().unwrap().to_str().unwrap(), "Hips");
    }

    #[test]
    fn null_handle_does_not_resolve() {
        let table = table();
        table.add("spine").unwrap();
        let err = table.content(Handle::NULL).unwrap_err();
        assert!(matches!(err, SymbolicError::InvalidHandle { .. }));
        assert_eq!(Handle::default(), Handle::NULL);
    }

    #[test]
    fn first_arena_is_opened_eagerly() {
        let table = table();
        assert_eq!(table.arena_count(), 1);
        assert!(table.is_empty());
        assert_eq!(table.stats().bytes_used, 0);
    }

    #[test]
    fn rejects_invalid_config() {
        let err = NameTable::with_system_blocks(PoolConfig::default().with_hash_buckets(3))
            .unwrap_err();
        assert_eq!(err.code(), "E201");
    }

    #[test]
    fn hash_collisions_stay_distinct_with_content_comparison() {
        // "a_" and "f8" collide under the case-insensitive djb2 hash.
        assert_eq!(hash_ascii_ci(b"a_"), hash_ascii_ci(b"f8"));

        let table = table();
        let a = table.add("a_").unwrap();
        let f = table.add("f8").unwrap();
        assert_ne!(a, f);
        assert_eq!(table.find("F8").unwrap(), f);
        assert_eq!(table.find("A_").unwrap(), a);
    }

    #[test]
    fn hash_only_identity_merges_collisions() {
        let config = PoolConfig::compact().with_content_comparison(false);
        let table = NameTable::with_system_blocks(config).unwrap();

        let a = table.add("a_").unwrap();
        assert!(matches!(
            table.add("f8"),
            Err(SymbolicError::DuplicateName { existing, .. }) if existing == a
        ));
        assert_eq!(table.find_or_add("f8").unwrap(), a);
        assert_eq!(table.content(a).unwrap(), "a_");
    }

    #[test]
    fn stats_track_usage() {
        let table = table();
        table.add("l_hand").unwrap();
        table.add("r_hand").unwrap();

        let stats = table.stats();
        assert_eq!(stats.names, 2);
        assert_eq!(stats.arenas, 1);
        assert_eq!(stats.bytes_used, 2 * crate::arena::chunk_footprint(6));
        assert_eq!(stats.capacity, table.config().capacity());
    }

    #[test]
    fn table_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NameTable>();
    }
}
