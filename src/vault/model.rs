//! In-memory data model: a vault of independently keyed sections.
//!
//! Ordered maps are used throughout so iteration (and therefore the
//! serialized file) is always in lexicographic name order.

use std::collections::BTreeMap;

use crate::crypto::cipher::{self, NONCE_LEN};
use crate::crypto::KdfParams;
use crate::errors::{Result, VaultError};

/// Current schema version written to new vault files.
pub const SCHEMA_VERSION: u16 = 1;

/// Longest accepted section, owner, entry, or field name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// The whole vault file: section name -> section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    pub schema_version: u16,
    pub sections: BTreeMap<String, Section>,
}

impl Default for Vault {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            sections: BTreeMap::new(),
        }
    }
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, name: &str) -> Result<&Section> {
        self.sections
            .get(name)
            .ok_or_else(|| VaultError::section_not_found(name))
    }

    pub fn section_mut(&mut self, name: &str) -> Result<&mut Section> {
        self.sections
            .get_mut(name)
            .ok_or_else(|| VaultError::section_not_found(name))
    }

    /// Insert a new section, refusing to replace an existing one.
    pub fn insert_section(&mut self, name: &str, section: Section) -> Result<()> {
        if self.sections.contains_key(name) {
            return Err(VaultError::DuplicateName(name.to_string()));
        }
        self.sections.insert(name.to_string(), section);
        Ok(())
    }

    pub fn remove_section(&mut self, name: &str) -> Result<Section> {
        self.sections
            .remove(name)
            .ok_or_else(|| VaultError::section_not_found(name))
    }

    /// Returns `true` if any section already uses this salt.
    pub fn salt_in_use(&self, salt: &[u8]) -> bool {
        self.sections.values().any(|s| s.salt == salt)
    }

    /// Returns `true` if any section already uses this base nonce.
    pub fn nonce_in_use(&self, nonce: &[u8]) -> bool {
        self.sections.values().any(|s| s.nonce == nonce)
    }
}

/// One independently owned and keyed partition of the vault.
///
/// `verification_hash` holds the PHC string as bytes; the derived key
/// itself never appears here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub owner: Owner,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub kdf: KdfParams,
    pub verification_hash: Vec<u8>,
}

impl Section {
    /// The verification hash as the PHC string it was stored as.
    pub fn verification_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.verification_hash)
            .map_err(|_| VaultError::KeyDerivation("verification hash is not valid UTF-8".into()))
    }

    /// Every per-field nonce mask currently stored in this section.
    pub fn used_masks(&self) -> Vec<[u8; NONCE_LEN]> {
        self.owner
            .entries
            .values()
            .flat_map(|e| e.content.values())
            .filter_map(|sealed| cipher::mask_of(sealed).copied())
            .collect()
    }
}

/// The identity that authenticates a section, and its entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub name: String,
    pub entries: BTreeMap<String, Entry>,
}

impl Owner {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: BTreeMap::new(),
        }
    }

    pub fn entry(&self, name: &str) -> Result<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| VaultError::entry_not_found(name))
    }

    pub fn remove_entry(&mut self, name: &str) -> Result<Entry> {
        self.entries
            .remove(name)
            .ok_or_else(|| VaultError::entry_not_found(name))
    }
}

/// A named group of sealed fields.
///
/// `owner` is the owner's name kept for auditing, not a live link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub owner: String,
    /// field name -> sealed bytes (mask || ciphertext || tag).
    pub content: BTreeMap<String, Vec<u8>>,
}

/// Validate a section, owner, entry, or field name.
///
/// Must be non-empty, at most 255 bytes, and free of control characters.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VaultError::InvalidName(format!("{kind} name cannot be empty")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(VaultError::InvalidName(format!(
            "{kind} name cannot exceed {MAX_NAME_LEN} bytes"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(VaultError::InvalidName(format!(
            "{kind} name '{}' contains control characters",
            name.escape_debug()
        )));
    }
    Ok(())
}
