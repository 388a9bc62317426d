//! Case-insensitive hashing of ASCII names.

use crate::error::{Result, SymbolicError};

/// Seed of the djb2 family of hashes.
const DJB2_SEED: u32 = 5381;

/// Hash ASCII text case-insensitively with the xor variant of djb2.
///
/// Uppercase ASCII letters are folded to lowercase before mixing, so case
/// variants of a name collide on purpose. Other bytes are mixed unchanged.
#[must_use]
pub const fn hash_ascii_ci(bytes: &[u8]) -> u32 {
    let mut hash = DJB2_SEED;
    let mut i = 0;
    while i < bytes.len() {
        let lower = bytes[i].to_ascii_lowercase() as u32;
        hash = ((hash << 5).wrapping_add(hash)) ^ lower;
        i += 1;
    }
    hash
}

/// Check that `text` may be interned under the given exclusive length bound.
pub fn validate_name(text: &str, max_length: usize) -> Result<()> {
    if !text.is_ascii() {
        return Err(SymbolicError::InvalidInput {
            length: text.len(),
            cause: "name must be pure ASCII".to_string(),
        });
    }

    if text.len() >= max_length {
        return Err(SymbolicError::InvalidInput {
            length: text.len(),
            cause: format!("name must be shorter than {max_length} bytes"),
        });
    }

    Ok(())
}
