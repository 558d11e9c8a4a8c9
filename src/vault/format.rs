//! Binary vault file format.
//!
//! A vault file has this layout (all integers little-endian):
//!
//! ```text
//! MAGIC            3 bytes   24 BE EF
//! SEPARATOR        5 bytes   24 2D 2D 2D 24   ("$---$")
//! SCHEMA_VERSION   u16
//! repeated, each followed by SEPARATOR:
//!     section-name       u32 len + bytes
//!     owner-name         u32 len + bytes
//!     salt               u32 len + bytes
//!     nonce              u32 len + bytes
//!     memory-cost        u32
//!     time-cost          u32
//!     parallelism        u32
//!     verification-hash  u32 len + bytes
//!     entry-count        u32
//!     repeated entry:
//!         entry-name     u32 len + bytes
//!         field-count    u32
//!         repeated (field-name u32 len + bytes, ciphertext u32 len + bytes)
//! SEPARATOR        trailing, end of file
//! ```
//!
//! Sections and entries are written in name order, so the same vault
//! always produces the same bytes. Changing either constant requires a
//! schema version bump.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::crypto::cipher::NONCE_LEN;
use crate::crypto::kdf::MIN_SALT_LEN;
use crate::crypto::KdfParams;
use crate::errors::{Result, VaultError};

use super::model::{validate_name, Entry, Owner, Section, Vault, SCHEMA_VERSION};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic bytes at the start of every vault file ("$beef").
pub const MAGIC: [u8; 3] = [0x24, 0xBE, 0xEF];

/// Separator between header, section records, and end of file ("$---$").
pub const SEPARATOR: [u8; 5] = [0x24, 0x2D, 0x2D, 0x2D, 0x24];

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serialize a vault to bytes.
pub fn encode(vault: &Vault) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&SEPARATOR);
    buf.extend_from_slice(&vault.schema_version.to_le_bytes());

    for (name, section) in &vault.sections {
        put_bytes(&mut buf, name.as_bytes())?;
        put_bytes(&mut buf, section.owner.name.as_bytes())?;
        put_bytes(&mut buf, &section.salt)?;
        put_bytes(&mut buf, &section.nonce)?;
        buf.extend_from_slice(&section.kdf.memory_kib.to_le_bytes());
        buf.extend_from_slice(&section.kdf.iterations.to_le_bytes());
        buf.extend_from_slice(&section.kdf.parallelism.to_le_bytes());
        put_bytes(&mut buf, &section.verification_hash)?;

        put_count(&mut buf, section.owner.entries.len())?;
        for (entry_name, entry) in &section.owner.entries {
            put_bytes(&mut buf, entry_name.as_bytes())?;
            put_count(&mut buf, entry.content.len())?;
            for (field, sealed) in &entry.content {
                put_bytes(&mut buf, field.as_bytes())?;
                put_bytes(&mut buf, sealed)?;
            }
        }

        buf.extend_from_slice(&SEPARATOR);
    }

    buf.extend_from_slice(&SEPARATOR);
    Ok(buf)
}

fn put_count(buf: &mut Vec<u8>, count: usize) -> Result<()> {
    let count = u32::try_from(count).map_err(|_| {
        VaultError::Persistence(format!("count {count} exceeds u32::MAX"))
    })?;
    buf.extend_from_slice(&count.to_le_bytes());
    Ok(())
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    put_count(buf, bytes.len())?;
    buf.extend_from_slice(bytes);
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Bounds-checked cursor over the raw file bytes.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(VaultError::Parse(format!(
                "{what} at offset {} needs {len} bytes, only {} left",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn expect(&mut self, marker: &[u8], what: &str) -> Result<()> {
        let at = self.pos;
        if self.take(marker.len(), what)? != marker {
            return Err(VaultError::Parse(format!("bad {what} at offset {at}")));
        }
        Ok(())
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        let bytes = self.take(2, what)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn bytes(&mut self, what: &str) -> Result<&'a [u8]> {
        let len = self.u32(what)?;
        let len = usize::try_from(len)
            .map_err(|_| VaultError::Parse(format!("{what} length {len} is too large")))?;
        self.take(len, what)
    }

    fn name(&mut self, kind: &str) -> Result<String> {
        let raw = self.bytes(kind)?;
        let name = std::str::from_utf8(raw)
            .map_err(|_| VaultError::Parse(format!("{kind} name is not valid UTF-8")))?;
        validate_name(kind, name).map_err(|e| VaultError::Parse(e.to_string()))?;
        Ok(name.to_string())
    }

    /// True when exactly the trailing separator is left.
    fn at_end_marker(&self) -> bool {
        self.data[self.pos..] == SEPARATOR
    }
}

/// Parse vault bytes. Either the whole vault is valid or nothing is returned.
pub fn decode(data: &[u8]) -> Result<Vault> {
    let mut r = Reader::new(data);
    r.expect(&MAGIC, "magic number")?;
    r.expect(&SEPARATOR, "header separator")?;

    let schema_version = r.u16("schema version")?;
    if schema_version != SCHEMA_VERSION {
        return Err(VaultError::Parse(format!(
            "unsupported schema version {schema_version}, expected {SCHEMA_VERSION}"
        )));
    }

    let mut sections = BTreeMap::new();
    while !r.at_end_marker() {
        let (name, section) = decode_section(&mut r)?;
        if sections.insert(name.clone(), section).is_some() {
            return Err(VaultError::Parse(format!("duplicate section '{name}'")));
        }
        r.expect(&SEPARATOR, "section separator")?;
    }

    Ok(Vault {
        schema_version,
        sections,
    })
}

fn decode_section(r: &mut Reader<'_>) -> Result<(String, Section)> {
    let name = r.name("Section")?;
    let owner_name = r.name("Owner")?;

    let salt = r.bytes("salt")?.to_vec();
    if salt.len() < MIN_SALT_LEN {
        return Err(VaultError::Parse(format!(
            "section '{name}' salt is {} bytes, need at least {MIN_SALT_LEN}",
            salt.len()
        )));
    }

    let nonce = r.bytes("nonce")?.to_vec();
    if nonce.len() != NONCE_LEN {
        return Err(VaultError::Parse(format!(
            "section '{name}' nonce is {} bytes, expected {NONCE_LEN}",
            nonce.len()
        )));
    }

    let kdf = KdfParams {
        memory_kib: r.u32("memory cost")?,
        iterations: r.u32("time cost")?,
        parallelism: r.u32("parallelism")?,
    };

    let verification_hash = r.bytes("verification hash")?.to_vec();
    if verification_hash.is_empty() {
        return Err(VaultError::Parse(format!(
            "section '{name}' has an empty verification hash"
        )));
    }

    let entry_count = r.u32("entry count")?;
    let mut entries = BTreeMap::new();
    for _ in 0..entry_count {
        let entry_name = r.name("Entry")?;
        let field_count = r.u32("field count")?;

        let mut content = BTreeMap::new();
        for _ in 0..field_count {
            let field = r.name("Field")?;
            let sealed = r.bytes("ciphertext")?.to_vec();
            if content.insert(field.clone(), sealed).is_some() {
                return Err(VaultError::Parse(format!(
                    "duplicate field '{field}' in entry '{entry_name}'"
                )));
            }
        }

        let entry = Entry {
            owner: owner_name.clone(),
            content,
        };
        if entries.insert(entry_name.clone(), entry).is_some() {
            return Err(VaultError::Parse(format!(
                "duplicate entry '{entry_name}' in section '{name}'"
            )));
        }
    }

    let section = Section {
        owner: Owner {
            name: owner_name,
            entries,
        },
        salt,
        nonce,
        kdf,
        verification_hash,
    };
    Ok((name, section))
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Write a vault file to disk **atomically** with owner-only permissions.
///
/// 1. Encode the vault.
/// 2. Write to a 0600 temp file in the same directory and sync it.
/// 3. Rename the temp file over the target path.
///
/// The rename ensures readers never see a half-written file.
pub fn write(vault: &Vault, path: &Path) -> Result<()> {
    require_path(path)?;
    let buf = encode(vault)?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    let result = write_private(&tmp_path, &buf).and_then(|()| {
        fs::rename(&tmp_path, path).map_err(|e| {
            VaultError::Persistence(format!("cannot replace {}: {e}", path.display()))
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result?;

    tracing::debug!(path = %path.display(), sections = vault.sections.len(), "vault written");
    Ok(())
}

fn write_private(path: &Path, buf: &[u8]) -> Result<()> {
    let persist = |e: std::io::Error| {
        VaultError::Persistence(format!("cannot write {}: {e}", path.display()))
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(persist)?;
    file.write_all(buf).map_err(persist)?;
    file.sync_all().map_err(persist)?;

    // A pre-existing temp file keeps its old mode, so set it explicitly.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
            VaultError::Persistence(format!(
                "failed to restrict permissions on {}: {e}",
                path.display()
            ))
        })?;
    }

    Ok(())
}

/// Read and fully validate a vault file.
pub fn read(path: &Path) -> Result<Vault> {
    require_path(path)?;
    if !path.exists() {
        return Err(VaultError::Persistence(format!(
            "vault not found at {}",
            path.display()
        )));
    }

    let data = fs::read(path)
        .map_err(|e| VaultError::Persistence(format!("cannot read {}: {e}", path.display())))?;
    let vault = decode(&data)?;

    tracing::debug!(path = %path.display(), sections = vault.sections.len(), "vault read");
    Ok(vault)
}

/// An empty path is a configuration problem, reported before any I/O.
pub(crate) fn require_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(VaultError::Configuration(
            "no vault path provided — pass --vault <PATH> or set vault_file in .valve.toml".into(),
        ));
    }
    Ok(())
}
