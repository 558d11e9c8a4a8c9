//! Cryptographic primitives for Valve.
//!
//! This module provides:
//! - Argon2id key derivation and PHC verification strings (`kdf`)
//! - AES-256-GCM sealing with per-field nonces (`cipher`)
//! - The zeroize-on-drop `SectionKey` holder (`keys`)

pub mod cipher;
pub mod kdf;
pub mod keys;

pub use cipher::{open, seal};
pub use kdf::{derive, generate_salt, hash, verify, KdfParams};
pub use keys::SectionKey;
