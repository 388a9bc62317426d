//! Error types for Symbolic.
//!
//! Every failure of the name table is a distinguishable variant of
//! [`SymbolicError`] carrying a stable error code. Interning normally encodes
//! load-time invariants about the caller's data, so most callers treat these
//! as fatal; [`ResultExt::or_abort`] provides that fail-fast behaviour while
//! validators and tools can match on the variants instead.

use crate::types::Handle;
use thiserror::Error;

/// The main error type for Symbolic operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolicError {
    // =========================================================================
    // Caller contract errors (E001-E099)
    // =========================================================================
    /// The input text is not ASCII or is too long to intern.
    #[error("E001: Invalid name input of {length} bytes: {cause}")]
    InvalidInput {
        /// Byte length of the rejected input.
        length: usize,
        /// Why the input was rejected.
        cause: String,
    },

    /// `add` was called for a name that is already interned.
    #[error("E002: Name '{name}' is already registered as {existing}")]
    DuplicateName {
        /// The text passed to `add`.
        name: String,
        /// Handle of the entry that already holds this name.
        existing: Handle,
    },

    /// `find` was called for a name that was never interned.
    #[error("E003: Name '{name}' is not registered")]
    NameNotFound {
        /// The text that was looked up.
        name: String,
    },

    /// A handle does not resolve inside this table.
    #[error("E004: Handle {handle} does not resolve: {cause}")]
    InvalidHandle {
        /// The offending handle.
        handle: Handle,
        /// Why resolution failed.
        cause: String,
    },

    // =========================================================================
    // Capacity errors (E100-E199)
    // =========================================================================
    /// The block source could not supply an arena.
    #[error("E101: Block source failed to allocate an arena of {size} bytes")]
    AllocationFailure {
        /// Size of the requested block.
        size: usize,
    },

    /// Every arena the table may own is already open and full.
    #[error("E102: Name arenas exhausted: all {max_arenas} arenas are in use")]
    ArenaExhausted {
        /// Configured arena limit.
        max_arenas: usize,
    },

    // =========================================================================
    // Configuration errors (E200-E299)
    // =========================================================================
    /// A pool configuration value is out of range.
    #[error("E201: Invalid pool configuration for '{field}': {cause}")]
    InvalidConfig {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        cause: String,
    },
}

impl SymbolicError {
    /// Get the error code (e.g., "E001").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "E001",
            Self::DuplicateName { .. } => "E002",
            Self::NameNotFound { .. } => "E003",
            Self::InvalidHandle { .. } => "E004",
            Self::AllocationFailure { .. } => "E101",
            Self::ArenaExhausted { .. } => "E102",
            Self::InvalidConfig { .. } => "E201",
        }
    }

    /// Check if the caller broke the contract of the operation it invoked.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::DuplicateName { .. }
                | Self::NameNotFound { .. }
                | Self::InvalidHandle { .. }
        )
    }

    /// Check if this error means the table ran out of memory.
    #[must_use]
    pub fn is_capacity_error(&self) -> bool {
        matches!(
            self,
            Self::AllocationFailure { .. } | Self::ArenaExhausted { .. }
        )
    }
}

/// Result type alias using `SymbolicError`.
pub type Result<T> = std::result::Result<T, SymbolicError>;

/// Extension trait for fail-fast handling of table results.
pub trait ResultExt<T> {
    /// Return the value, or report the error and abort the process.
    ///
    /// The report goes through `tracing` at error level, so the installed
    /// subscriber decides where it ends up.
    fn or_abort(self) -> T;
}

impl<T> ResultExt<T> for Result<T> {
    #[track_caller]
    fn or_abort(self) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                let location = std::panic::Location::caller();
                tracing::error!(
                    code = e.code(),
                    file = location.file(),
                    line = location.line(),
                    "{}",
                    e
                );
                std::process::abort()
            }
        }
    }
}
