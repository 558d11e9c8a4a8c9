//! In-memory holder for a section's derived key.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::kdf::KEY_LEN;

/// A 32-byte section key that zeroes its memory when dropped.
///
/// Only ever produced by `kdf::derive` and never serialized.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SectionKey {
    bytes: [u8; KEY_LEN],
}

impl SectionKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes (e.g. to build a cipher).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SectionKey(<redacted>)")
    }
}
