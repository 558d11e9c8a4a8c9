//! High-level vault operations used by the CLI.
//!
//! `VaultService` owns the in-memory vault plus the keys of every
//! currently unlocked section, behind a single `RwLock`. Mutations and
//! saves take the write lock; Argon2 work always happens outside it and
//! is committed only if the section's verification hash is unchanged, so
//! a section is either fully rotated/unlocked or left exactly as it was.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use zeroize::Zeroize;

use crate::crypto::cipher::{self, NONCE_LEN};
use crate::crypto::kdf::{self, KdfParams};
use crate::crypto::SectionKey;
use crate::errors::{Result, VaultError};

use super::format;
use super::model::{validate_name, Entry, Owner, Section, Vault};

/// Plaintext fields of an entry: field name -> value.
pub type Fields = BTreeMap<String, String>;

/// Opaque reference to a section, handed out by `create_section` and
/// `authenticate`. It carries no key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHandle {
    name: String,
}

impl SectionHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Metadata about a section. No decryption involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSummary {
    pub name: String,
    pub owner: String,
    pub entry_count: usize,
    pub unlocked: bool,
}

/// Entry name and its field names, without values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub name: String,
    pub fields: Vec<String>,
}

struct State {
    vault: Vault,
    /// Keys of unlocked sections (zeroized on drop).
    sessions: HashMap<String, SectionKey>,
}

impl State {
    fn session_key(&self, section: &str) -> Result<&SectionKey> {
        if !self.vault.sections.contains_key(section) {
            return Err(VaultError::section_not_found(section));
        }
        self.sessions
            .get(section)
            .ok_or_else(|| VaultError::NotAuthenticated(section.to_string()))
    }
}

/// Fresh key material for a section: salt, base nonce, hash, and key.
struct Keying {
    salt: Vec<u8>,
    nonce: Vec<u8>,
    kdf: KdfParams,
    verification_hash: Vec<u8>,
    key: SectionKey,
}

/// The main vault handle. Create one with `VaultService::create` or
/// `VaultService::open`, then use its methods to manage sections.
pub struct VaultService {
    /// Path to the vault file on disk.
    path: PathBuf,

    /// Argon2 parameters for new sections and key rotations.
    params: KdfParams,

    state: RwLock<State>,
}

impl VaultService {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a brand-new, empty vault file at `path`.
    pub fn create(path: &Path, params: KdfParams) -> Result<Self> {
        format::require_path(path)?;
        params.validate()?;
        if path.exists() {
            return Err(VaultError::Persistence(format!(
                "vault already exists at {}",
                path.display()
            )));
        }

        let service = Self::from_vault(path, params, Vault::new());
        service.save()?;
        tracing::info!(path = %path.display(), "vault created");
        Ok(service)
    }

    /// Load an existing vault file. Every section starts locked.
    pub fn open(path: &Path, params: KdfParams) -> Result<Self> {
        params.validate()?;
        let vault = format::read(path)?;
        tracing::info!(
            path = %path.display(),
            sections = vault.sections.len(),
            "vault opened"
        );
        Ok(Self::from_vault(path, params, vault))
    }

    fn from_vault(path: &Path, params: KdfParams, vault: Vault) -> Self {
        Self {
            path: path.to_path_buf(),
            params,
            state: RwLock::new(State {
                vault,
                sessions: HashMap::new(),
            }),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Section lifecycle
    // ------------------------------------------------------------------

    /// Create a section owned by `owner` and leave it unlocked.
    ///
    /// Only the verification hash of `password` is stored.
    pub fn create_section(
        &self,
        name: &str,
        owner: &str,
        password: &[u8],
    ) -> Result<SectionHandle> {
        validate_name("Section", name)?;
        validate_name("Owner", owner)?;

        if self.read_state().vault.sections.contains_key(name) {
            return Err(VaultError::DuplicateName(name.to_string()));
        }

        let keying = self.new_keying(password)?;

        let mut state = self.write_state();
        if state.vault.salt_in_use(&keying.salt) || state.vault.nonce_in_use(&keying.nonce) {
            return Err(VaultError::KeyDerivation(
                "salt or nonce collided with another section, try again".into(),
            ));
        }
        let section = Section {
            owner: Owner::new(owner),
            salt: keying.salt,
            nonce: keying.nonce,
            kdf: keying.kdf,
            verification_hash: keying.verification_hash,
        };
        state.vault.insert_section(name, section)?;
        state.sessions.insert(name.to_string(), keying.key);

        tracing::info!(section = name, "section created");
        Ok(SectionHandle {
            name: name.to_string(),
        })
    }

    /// Unlock a section with its password.
    ///
    /// A wrong password gives `Authentication` and leaves the section as
    /// it was. Calling this again on an unlocked section is harmless.
    pub fn authenticate(&self, name: &str, password: &[u8]) -> Result<SectionHandle> {
        let (encoded, salt, params) = {
            let state = self.read_state();
            let section = state.vault.section(name)?;
            (
                section.verification_str()?.to_string(),
                section.salt.clone(),
                section.kdf,
            )
        };

        if !kdf::verify(password, &encoded)? {
            tracing::debug!(section = name, "authentication failed");
            return Err(VaultError::Authentication);
        }
        let key = kdf::derive(password, &salt, &params)?;

        let mut state = self.write_state();
        let unchanged = state
            .vault
            .sections
            .get(name)
            .is_some_and(|s| s.verification_hash == encoded.as_bytes());
        if !unchanged {
            return Err(VaultError::Authentication);
        }
        state.sessions.insert(name.to_string(), key);

        tracing::debug!(section = name, "section unlocked");
        Ok(SectionHandle {
            name: name.to_string(),
        })
    }

    /// Drop the section's key, returning it to the locked state.
    pub fn lock(&self, handle: &SectionHandle) {
        if self.write_state().sessions.remove(&handle.name).is_some() {
            tracing::debug!(section = %handle.name, "section locked");
        }
    }

    /// Returns `true` if the named section currently holds a key.
    pub fn is_unlocked(&self, name: &str) -> bool {
        self.read_state().sessions.contains_key(name)
    }

    /// A handle to an existing section without unlocking it.
    ///
    /// Useful for `change_secret_key`, which checks the old password itself.
    pub fn section(&self, name: &str) -> Result<SectionHandle> {
        self.read_state().vault.section(name)?;
        Ok(SectionHandle {
            name: name.to_string(),
        })
    }

    /// Remove a section and everything in it. Requires the section to be unlocked.
    pub fn delete_section(&self, handle: &SectionHandle) -> Result<()> {
        let mut state = self.write_state();
        state.session_key(&handle.name)?;
        state.vault.remove_section(&handle.name)?;
        state.sessions.remove(&handle.name);

        tracing::info!(section = %handle.name, "section deleted");
        Ok(())
    }

    /// Rotate a section's password.
    ///
    /// Re-verifies `old_password`, then derives a new key from a fresh
    /// salt and re-seals every field under it with fresh nonces. Nothing
    /// changes unless every step succeeds.
    pub fn change_secret_key(
        &self,
        handle: &SectionHandle,
        old_password: &[u8],
        new_password: &[u8],
        confirm_password: &[u8],
    ) -> Result<()> {
        let name = handle.name.as_str();
        let (encoded, salt, params) = {
            let state = self.read_state();
            let section = state.vault.section(name)?;
            (
                section.verification_str()?.to_string(),
                section.salt.clone(),
                section.kdf,
            )
        };

        if !kdf::verify(old_password, &encoded)? {
            tracing::debug!(section = name, "key change refused");
            return Err(VaultError::Authentication);
        }
        if new_password != confirm_password {
            return Err(VaultError::PasswordMismatch);
        }

        let old_key = kdf::derive(old_password, &salt, &params)?;
        let keying = self.new_keying(new_password)?;

        let mut state = self.write_state();
        let current = state.vault.section(name)?;
        if current.verification_hash != encoded.as_bytes() {
            // Rotated by someone else while we were deriving.
            return Err(VaultError::Authentication);
        }

        let mut entries = BTreeMap::new();
        let mut used: Vec<[u8; NONCE_LEN]> = Vec::new();
        for (entry_name, entry) in &current.owner.entries {
            let mut fields = open_fields(name, entry_name, current, &old_key)?;
            let content = seal_fields(
                name,
                entry_name,
                &keying.nonce,
                &keying.key,
                &fields,
                &mut used,
            );
            zeroize_fields(&mut fields);
            entries.insert(
                entry_name.clone(),
                Entry {
                    owner: entry.owner.clone(),
                    content: content?,
                },
            );
        }

        let rotated = Section {
            owner: Owner {
                name: current.owner.name.clone(),
                entries,
            },
            salt: keying.salt,
            nonce: keying.nonce,
            kdf: keying.kdf,
            verification_hash: keying.verification_hash,
        };
        let field_count = rotated.used_masks().len();
        state.vault.sections.insert(name.to_string(), rotated);
        state.sessions.insert(name.to_string(), keying.key);

        tracing::info!(section = name, fields = field_count, "section key rotated");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Entry operations
    // ------------------------------------------------------------------

    /// Encrypt and store a new entry. Existing entries are never overwritten.
    pub fn add_entry(&self, handle: &SectionHandle, entry_name: &str, fields: &Fields) -> Result<()> {
        validate_name("Entry", entry_name)?;
        if fields.is_empty() {
            return Err(VaultError::InvalidName(format!(
                "entry '{entry_name}' needs at least one field"
            )));
        }
        for field in fields.keys() {
            validate_name("Field", field)?;
        }

        let mut state = self.write_state();
        let key = state.session_key(&handle.name)?;
        let section = state.vault.section(&handle.name)?;
        if section.owner.entries.contains_key(entry_name) {
            return Err(VaultError::DuplicateEntry {
                section: handle.name.clone(),
                entry: entry_name.to_string(),
            });
        }

        let mut used = section.used_masks();
        let content = seal_fields(
            &handle.name,
            entry_name,
            &section.nonce,
            key,
            fields,
            &mut used,
        )?;

        let section = state.vault.section_mut(&handle.name)?;
        let entry = Entry {
            owner: section.owner.name.clone(),
            content,
        };
        section.owner.entries.insert(entry_name.to_string(), entry);

        tracing::debug!(section = %handle.name, entry = entry_name, "entry added");
        Ok(())
    }

    /// Decrypt every field of an entry.
    pub fn read_entry(&self, handle: &SectionHandle, entry_name: &str) -> Result<Fields> {
        let state = self.read_state();
        let key = state.session_key(&handle.name)?;
        let section = state.vault.section(&handle.name)?;
        open_fields(&handle.name, entry_name, section, key)
    }

    /// Remove an entry from an unlocked section.
    pub fn delete_entry(&self, handle: &SectionHandle, entry_name: &str) -> Result<()> {
        let mut state = self.write_state();
        state.session_key(&handle.name)?;
        state
            .vault
            .section_mut(&handle.name)?
            .owner
            .remove_entry(entry_name)?;

        tracing::debug!(section = %handle.name, entry = entry_name, "entry deleted");
        Ok(())
    }

    /// List entry and field names of an unlocked section, sorted by name.
    pub fn list_entries(&self, handle: &SectionHandle) -> Result<Vec<EntrySummary>> {
        let state = self.read_state();
        state.session_key(&handle.name)?;
        let section = state.vault.section(&handle.name)?;
        Ok(section
            .owner
            .entries
            .iter()
            .map(|(name, entry)| EntrySummary {
                name: name.clone(),
                fields: entry.content.keys().cloned().collect(),
            })
            .collect())
    }

    /// List all sections with their owners, sorted by name.
    pub fn list_sections(&self) -> Vec<SectionSummary> {
        let state = self.read_state();
        state
            .vault
            .sections
            .iter()
            .map(|(name, section)| SectionSummary {
                name: name.clone(),
                owner: section.owner.name.clone(),
                entry_count: section.owner.entries.len(),
                unlocked: state.sessions.contains_key(name),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write the whole vault to disk atomically.
    ///
    /// Holds the write lock so the snapshot is consistent.
    pub fn save(&self) -> Result<()> {
        let state = self.write_state();
        format::write(&state.vault, &self.path)?;
        tracing::info!(
            path = %self.path.display(),
            sections = state.vault.sections.len(),
            "vault saved"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Returns the path to the vault file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the Argon2 parameters used for new keys.
    pub fn params(&self) -> KdfParams {
        self.params
    }

    /// Returns the number of sections in the vault.
    pub fn section_count(&self) -> usize {
        self.read_state().vault.sections.len()
    }

    /// A copy of the current in-memory vault (ciphertext only).
    pub fn snapshot(&self) -> Vault {
        self.read_state().vault.clone()
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Fresh salt and nonce (unused by other sections), plus the hash and key.
    fn new_keying(&self, password: &[u8]) -> Result<Keying> {
        let (salt, nonce) = {
            let state = self.read_state();
            let mut salt = kdf::generate_salt();
            while state.vault.salt_in_use(&salt) {
                salt = kdf::generate_salt();
            }
            let mut nonce = cipher::generate_nonce();
            while state.vault.nonce_in_use(&nonce) {
                nonce = cipher::generate_nonce();
            }
            (salt, nonce)
        };

        let verification_hash = kdf::hash(password, &salt, &self.params)?.into_bytes();
        let key = kdf::derive(password, &salt, &self.params)?;
        Ok(Keying {
            salt: salt.to_vec(),
            nonce: nonce.to_vec(),
            kdf: self.params,
            verification_hash,
            key,
        })
    }
}

/// Seal each field with its own nonce mask, recording masks in `used`.
fn seal_fields(
    section: &str,
    entry: &str,
    base_nonce: &[u8],
    key: &SectionKey,
    fields: &Fields,
    used: &mut Vec<[u8; NONCE_LEN]>,
) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut content = BTreeMap::new();
    for (field, value) in fields {
        let mask = cipher::fresh_mask(used);
        used.push(mask);
        let aad = cipher::field_aad(section, entry, field);
        let sealed = cipher::seal(key, base_nonce, &mask, value.as_bytes(), &aad)?;
        content.insert(field.clone(), sealed);
    }
    Ok(content)
}

/// Decrypt each field of an entry.
fn open_fields(section_name: &str, entry: &str, section: &Section, key: &SectionKey) -> Result<Fields> {
    let sealed_fields = &section.owner.entry(entry)?.content;
    let mut fields = Fields::new();
    for (field, sealed) in sealed_fields {
        let aad = cipher::field_aad(section_name, entry, field);
        let plaintext = match cipher::open(key, &section.nonce, sealed, &aad) {
            Ok(p) => p,
            Err(e) => {
                zeroize_fields(&mut fields);
                return Err(e);
            }
        };
        match String::from_utf8(plaintext) {
            Ok(value) => {
                fields.insert(field.clone(), value);
            }
            Err(e) => {
                let mut bad_bytes = e.into_bytes();
                bad_bytes.zeroize();
                zeroize_fields(&mut fields);
                return Err(VaultError::Authentication);
            }
        }
    }
    Ok(fields)
}

/// Wipe decrypted values in place.
pub fn zeroize_fields(fields: &mut Fields) {
    for value in fields.values_mut() {
        value.zeroize();
    }
}
