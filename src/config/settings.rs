use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::KdfParams;
use crate::errors::{Result, VaultError};

/// Project-level configuration, loaded from `.valve.toml`.
///
/// Every field has a default, so Valve works without a config file as
/// long as `--vault` is given on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Vault file to use when `--vault` is not given.
    #[serde(default)]
    pub vault_file: Option<String>,

    /// Argon2 memory cost in KiB for new keys (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count for new keys (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree for new keys (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_argon2_memory_kib() -> u32 {
    KdfParams::default().memory_kib
}

fn default_argon2_iterations() -> u32 {
    KdfParams::default().iterations
}

fn default_argon2_parallelism() -> u32 {
    KdfParams::default().parallelism
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_file: None,
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    pub const FILE_NAME: &'static str = ".valve.toml";

    /// Load settings from `<project_dir>/.valve.toml`.
    ///
    /// If the file does not exist, defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            VaultError::Configuration(format!("cannot read {}: {e}", config_path.display()))
        })?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultError::Configuration(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        tracing::debug!(path = %config_path.display(), "loaded settings");
        Ok(settings)
    }

    /// Resolve the vault file: `cli_override` first, then `vault_file`.
    ///
    /// Relative paths are taken relative to `project_dir`. Having neither
    /// is a configuration error.
    pub fn vault_path(&self, project_dir: &Path, cli_override: Option<&str>) -> Result<PathBuf> {
        let raw = cli_override
            .or(self.vault_file.as_deref())
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                VaultError::Configuration(format!(
                    "no vault path provided — pass --vault <PATH> or set vault_file in {}",
                    Self::FILE_NAME
                ))
            })?;
        Ok(project_dir.join(raw))
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
