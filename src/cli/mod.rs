//! CLI module: Clap argument parser, output helpers, and command implementations.
//!
//! This is a thin layer: it prompts for input and calls `VaultService`.
//! It performs no cryptography and never sees derived keys.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::errors::{Result, VaultError};
use crate::vault::{SectionHandle, VaultService};

/// Minimum length for newly chosen passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Attempts allowed when unlocking a section interactively.
const UNLOCK_ATTEMPTS: usize = 3;

/// Valve CLI: a local vault of independently keyed secret sections.
#[derive(Parser)]
#[command(
    name = "valve",
    about = "Local secret vault with independently keyed sections",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault file (overrides `vault_file` in .valve.toml)
    #[arg(long, global = true)]
    pub vault: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new, empty vault file
    Init,

    /// Manage sections (create, delete, list)
    Section {
        #[command(subcommand)]
        action: SectionAction,
    },

    /// Add an entry to a section
    Add {
        /// Section name
        section: String,
        /// Entry name (e.g. github)
        entry: String,
        /// Fields as FIELD=VALUE, or FIELD alone to be prompted for the value
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Decrypt and print an entry
    Get {
        /// Section name
        section: String,
        /// Entry name
        entry: String,
        /// Print only this field's value
        #[arg(short, long)]
        field: Option<String>,
    },

    /// List the entries of a section
    Entries {
        /// Section name
        section: String,
    },

    /// Delete an entry from a section
    Delete {
        /// Section name
        section: String,
        /// Entry name
        entry: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Change a section's password and re-encrypt its entries
    RotateKey {
        /// Section name
        section: String,
    },
}

/// Section subcommands.
#[derive(clap::Subcommand)]
pub enum SectionAction {
    /// Create a new section
    Create {
        /// Section name
        name: String,
        /// Owner of the section
        #[arg(short, long)]
        owner: String,
    },

    /// Delete a section and all of its entries
    Delete {
        /// Section name
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// List all sections and their owners
    List,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolve the vault path from `--vault` or `.valve.toml`.
///
/// Fails with a configuration error before any file is touched.
pub fn resolve(cli: &Cli) -> Result<(PathBuf, Settings)> {
    let cwd = std::env::current_dir()
        .map_err(|e| VaultError::Configuration(format!("cannot read working directory: {e}")))?;
    let settings = Settings::load(&cwd)?;
    let path = settings.vault_path(&cwd, cli.vault.as_deref())?;
    Ok((path, settings))
}

/// Open the configured vault file.
pub fn open_service(cli: &Cli) -> Result<VaultService> {
    let (path, settings) = resolve(cli)?;
    VaultService::open(&path, settings.kdf_params())
}

/// Prompt for an existing password.
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    let pw = dialoguer::Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password and its confirmation.
///
/// Returns both so the vault can check the confirmation itself.
/// Enforces a minimum password length.
pub fn prompt_new_password(prompt: &str) -> Result<(Zeroizing<String>, Zeroizing<String>)> {
    loop {
        let password = prompt_password(prompt)?;
        if password.len() < MIN_PASSWORD_LEN {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }
        let confirmation = prompt_password("Confirm password")?;
        return Ok((password, confirmation));
    }
}

/// Unlock a section, re-prompting on a wrong password.
pub fn unlock(service: &VaultService, section: &str) -> Result<SectionHandle> {
    let mut attempt = 1;
    loop {
        let password = prompt_password(&format!("Password for section '{section}'"))?;
        match service.authenticate(section, password.as_bytes()) {
            Err(VaultError::Authentication) if attempt < UNLOCK_ATTEMPTS => {
                output::warning("Authentication failed. Try again.");
                attempt += 1;
            }
            result => return result,
        }
    }
}
