//! Password-based key derivation using Argon2id.
//!
//! A section password is turned into two unrelated artifacts:
//!
//! - a **verification string** in PHC format
//!   (`$argon2id$v=19$m=..,t=..,p=..$<salt>$<hash>`), which is the only
//!   thing persisted, and
//! - a 32-byte **working key** used for AES-256-GCM, computed over a
//!   domain-separated salt so it can never be read back out of the
//!   verification string.

use argon2::password_hash::{PasswordHash, PasswordHasher, SaltString};
use argon2::{Algorithm, Argon2, Params, Version, ARGON2ID_IDENT};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::keys::SectionKey;
use crate::errors::{Result, VaultError};

/// Length of the salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Shortest salt accepted from a vault file.
pub const MIN_SALT_LEN: usize = 16;

/// Length of the derived key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
pub const MIN_MEMORY_KIB: u32 = 8_192;

/// Ceiling on memory cost in KiB (4 GB), so a crafted file cannot exhaust memory.
pub const MAX_MEMORY_KIB: u32 = 4_194_304;

/// Upper bound on parallelism lanes.
pub const MAX_PARALLELISM: u32 = 255;

const KEY_SALT_DOMAIN: &[u8] = b"valve/section-key/v1";

/// Argon2id cost parameters stored per section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// The cheapest parameters still accepted. Meant for tests.
    pub const fn minimum() -> Self {
        Self {
            memory_kib: MIN_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        }
    }

    /// Reject parameters below the safety floor or outside argon2's range.
    pub fn validate(&self) -> Result<()> {
        if self.memory_kib < MIN_MEMORY_KIB || self.memory_kib > MAX_MEMORY_KIB {
            return Err(VaultError::KeyDerivation(format!(
                "Argon2 memory_kib must be between {MIN_MEMORY_KIB} and {MAX_MEMORY_KIB} (got {})",
                self.memory_kib
            )));
        }
        if self.iterations < 1 {
            return Err(VaultError::KeyDerivation(
                "Argon2 iterations must be at least 1".into(),
            ));
        }
        if self.parallelism < 1 || self.parallelism > MAX_PARALLELISM {
            return Err(VaultError::KeyDerivation(format!(
                "Argon2 parallelism must be between 1 and {MAX_PARALLELISM} (got {})",
                self.parallelism
            )));
        }
        Ok(())
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        self.validate()?;
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| VaultError::KeyDerivation(format!("invalid Argon2 params: {e}")))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Derive the 32-byte working key for a section.
///
/// The same password + salt + params always produce the same key.
pub fn derive(password: &[u8], salt: &[u8], params: &KdfParams) -> Result<SectionKey> {
    let argon2 = params.argon2()?;
    let key_salt = key_salt(salt);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, &key_salt, &mut key)
        .map_err(|e| VaultError::KeyDerivation(format!("Argon2id hashing failed: {e}")))?;

    let section_key = SectionKey::new(key);
    key.zeroize();
    Ok(section_key)
}

/// Produce the self-describing PHC verification string for a password.
pub fn hash(password: &[u8], salt: &[u8], params: &KdfParams) -> Result<String> {
    let argon2 = params.argon2()?;
    let salt_string = SaltString::encode_b64(salt)
        .map_err(|e| VaultError::KeyDerivation(format!("unusable salt: {e}")))?;

    let hash = argon2
        .hash_password(password, &salt_string)
        .map_err(|e| VaultError::KeyDerivation(format!("Argon2id hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Check a password against a stored verification string.
///
/// The hash is recomputed with the parameters and salt embedded in the
/// string and compared in constant time. A string that cannot be parsed
/// is an error rather than a mismatch.
pub fn verify(password: &[u8], encoded: &str) -> Result<bool> {
    let parsed = PasswordHash::new(encoded)
        .map_err(|e| VaultError::KeyDerivation(format!("malformed verification hash: {e}")))?;

    if parsed.algorithm != ARGON2ID_IDENT {
        return Err(VaultError::KeyDerivation(format!(
            "unsupported algorithm '{}'",
            parsed.algorithm
        )));
    }
    if let Some(version) = parsed.version {
        if version != Version::V0x13 as u32 {
            return Err(VaultError::KeyDerivation(format!(
                "unsupported Argon2 version {version}"
            )));
        }
    }

    let params = Params::try_from(&parsed)
        .map_err(|e| VaultError::KeyDerivation(format!("invalid Argon2 params: {e}")))?;
    KdfParams {
        memory_kib: params.m_cost(),
        iterations: params.t_cost(),
        parallelism: params.p_cost(),
    }
    .validate()?;

    let salt = parsed
        .salt
        .ok_or_else(|| VaultError::KeyDerivation("verification hash has no salt".into()))?;
    let mut salt_buf = [0u8; 64];
    let salt_bytes = salt
        .decode_b64(&mut salt_buf)
        .map_err(|e| VaultError::KeyDerivation(format!("bad salt encoding: {e}")))?;

    let expected = parsed
        .hash
        .ok_or_else(|| VaultError::KeyDerivation("verification hash has no output".into()))?;

    let mut actual = vec![0u8; expected.len()];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password, salt_bytes, &mut actual)
        .map_err(|e| VaultError::KeyDerivation(format!("Argon2id hashing failed: {e}")))?;

    let matched: bool = actual.as_slice().ct_eq(expected.as_bytes()).into();
    actual.zeroize();
    Ok(matched)
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

/// Salt used for the working key, distinct from the verification salt.
fn key_salt(salt: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(KEY_SALT_DOMAIN);
    hasher.update(salt);
    hasher.finalize().into()
}
