//! `valve section`: create, delete, and list sections.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{open_service, prompt_new_password, unlock, Cli};
use crate::errors::{Result, VaultError};

/// Execute `section create`.
pub fn create(cli: &Cli, name: &str, owner: &str) -> Result<()> {
    let service = open_service(cli)?;

    // Fail on a taken name before asking for a password.
    if service.list_sections().iter().any(|s| s.name == name) {
        return Err(VaultError::DuplicateName(name.to_string()));
    }

    output::info(&format!("Choose a password for section '{name}'."));
    let (password, confirmation) = prompt_new_password("Section password")?;
    if password.as_bytes() != confirmation.as_bytes() {
        return Err(VaultError::PasswordMismatch);
    }

    service.create_section(name, owner, password.as_bytes())?;
    service.save()?;

    output::success(&format!("Created section '{name}' owned by {owner}"));
    output::tip(&format!("Add a secret: valve add {name} <ENTRY> FIELD=VALUE"));
    Ok(())
}

/// Execute `section delete`.
pub fn delete(cli: &Cli, name: &str, force: bool) -> Result<()> {
    let service = open_service(cli)?;

    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete section '{name}' and all of its entries?"))
            .default(false)
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    let handle = unlock(&service, name)?;
    service.delete_section(&handle)?;
    service.save()?;

    output::success(&format!("Deleted section '{name}'"));
    Ok(())
}

/// Execute `section list`. Needs no password.
pub fn list(cli: &Cli) -> Result<()> {
    let service = open_service(cli)?;
    output::print_sections_table(&service.list_sections());
    Ok(())
}
