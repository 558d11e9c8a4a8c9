//! `valve rotate-key`: change a section's password.
//!
//! Verifies the current password, derives a new key from a fresh salt,
//! re-encrypts every entry of the section, and writes the vault
//! atomically.

use crate::cli::output;
use crate::cli::{open_service, prompt_new_password, prompt_password, Cli};
use crate::errors::Result;

/// Execute the `rotate-key` command.
pub fn execute(cli: &Cli, section: &str) -> Result<()> {
    let service = open_service(cli)?;
    let handle = service.section(section)?;

    output::info(&format!("Enter the current password for section '{section}'."));
    let old_password = prompt_password("Current password")?;

    output::info("Choose the new password.");
    let (new_password, confirmation) = prompt_new_password("New password")?;

    service.change_secret_key(
        &handle,
        old_password.as_bytes(),
        new_password.as_bytes(),
        confirmation.as_bytes(),
    )?;
    service.save()?;

    let entry_count = service.list_entries(&handle)?.len();
    output::success(&format!(
        "Password rotated for section '{section}' ({entry_count} entries re-encrypted)"
    ));
    Ok(())
}
