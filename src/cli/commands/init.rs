//! `valve init`: create a new, empty vault file.

use std::fs;

use crate::cli::output;
use crate::cli::{resolve, Cli};
use crate::errors::{Result, VaultError};
use crate::vault::VaultService;

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (path, settings) = resolve(cli)?;

    // Create the parent directory if it doesn't exist.
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                VaultError::Persistence(format!("cannot create {}: {e}", parent.display()))
            })?;
            output::info(&format!("Created directory: {}", parent.display()));
        }
    }

    let service = VaultService::create(&path, settings.kdf_params())?;

    let params = service.params();
    output::success(&format!("Created empty vault at {}", path.display()));
    output::info(&format!(
        "New sections use Argon2id with m={} KiB, t={}, p={}",
        params.memory_kib, params.iterations, params.parallelism
    ));
    output::tip("Next: valve section create <NAME> --owner <OWNER>");
    Ok(())
}
