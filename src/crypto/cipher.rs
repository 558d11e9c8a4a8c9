//! AES-256-GCM sealing of entry fields.
//!
//! One section key encrypts every field of that section, so each field
//! gets its own nonce: a random 12-byte *mask* is XORed into the
//! section's base nonce and stored in front of the ciphertext.
//!
//! Layout of a sealed field:
//!   [ 12-byte nonce mask | ciphertext + 16-byte auth tag ]
//!
//! Associated data binds the field to `section / entry / field`, so a
//! ciphertext copied to another location fails authentication.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

use super::keys::SectionKey;
use crate::errors::{Result, VaultError};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Generate a random base nonce for a section.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

/// Generate a per-field nonce mask that is not in `used`.
pub fn fresh_mask(used: &[[u8; NONCE_LEN]]) -> [u8; NONCE_LEN] {
    loop {
        let candidate = generate_nonce();
        if !used.contains(&candidate) {
            return candidate;
        }
    }
}

/// Read the nonce mask off the front of a sealed field.
pub fn mask_of(sealed: &[u8]) -> Option<&[u8; NONCE_LEN]> {
    sealed.get(..NONCE_LEN)?.try_into().ok()
}

/// Build the associated data for one field.
pub fn field_aad(section: &str, entry: &str, field: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(12 + section.len() + entry.len() + field.len());
    for part in [section, entry, field] {
        aad.extend_from_slice(&(part.len() as u32).to_le_bytes());
        aad.extend_from_slice(part.as_bytes());
    }
    aad
}

/// Encrypt `plaintext` under `key`, with nonce `base_nonce XOR mask`.
///
/// Returns the mask prepended to the ciphertext (mask || ciphertext).
pub fn seal(
    key: &SectionKey,
    base_nonce: &[u8],
    mask: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let nonce = field_nonce(base_nonce, mask)
        .ok_or_else(|| VaultError::Encryption("section nonce must be 12 bytes".into()))?;

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Encryption(format!("invalid key length: {e}")))?;

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| VaultError::Encryption(format!("encryption error: {e}")))?;

    let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    output.extend_from_slice(mask);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt a field produced by `seal`.
///
/// Every failure is reported as `Authentication`; no partial plaintext
/// is ever returned.
pub fn open(key: &SectionKey, base_nonce: &[u8], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::Authentication);
    }

    let (mask, ciphertext) = sealed.split_at(NONCE_LEN);
    let mask: &[u8; NONCE_LEN] = mask.try_into().map_err(|_| VaultError::Authentication)?;
    let nonce = field_nonce(base_nonce, mask).ok_or(VaultError::Authentication)?;

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| VaultError::Authentication)?;

    cipher
        .decrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| VaultError::Authentication)
}

fn field_nonce(base_nonce: &[u8], mask: &[u8; NONCE_LEN]) -> Option<[u8; NONCE_LEN]> {
    let base: &[u8; NONCE_LEN] = base_nonce.try_into().ok()?;
    let mut nonce = [0u8; NONCE_LEN];
    for (out, (b, m)) in nonce.iter_mut().zip(base.iter().zip(mask)) {
        *out = b ^ m;
    }
    Some(nonce)
}
