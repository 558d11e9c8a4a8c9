//! `valve delete`: remove an entry from a section.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{open_service, unlock, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `delete` command.
pub fn execute(cli: &Cli, section: &str, entry: &str, force: bool) -> Result<()> {
    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete entry '{entry}' from section '{section}'?"))
            .default(false)
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    let service = open_service(cli)?;
    let handle = unlock(&service, section)?;

    // The whole file is rewritten, so the old ciphertext is gone from disk.
    service.delete_entry(&handle, entry)?;
    service.save()?;

    output::success(&format!("Deleted entry '{entry}' from section '{section}'"));
    Ok(())
}
