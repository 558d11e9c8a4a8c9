//! Vault module: sectioned secret storage.
//!
//! This module provides:
//! - `Vault`, `Section`, `Owner`, and `Entry` types (`model`)
//! - The binary vault file format (`format`)
//! - The `VaultService` façade for section and entry operations (`service`)

pub mod format;
pub mod model;
pub mod service;

// Re-export the most commonly used items.
pub use model::{Entry, Owner, Section, Vault, SCHEMA_VERSION};
pub use service::{
    zeroize_fields, EntrySummary, Fields, SectionHandle, SectionSummary, VaultService,
};
