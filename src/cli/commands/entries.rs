//! `valve entries`: list the entries of a section.

use crate::cli::output;
use crate::cli::{open_service, unlock, Cli};
use crate::errors::Result;

/// Execute the `entries` command.
pub fn execute(cli: &Cli, section: &str) -> Result<()> {
    let service = open_service(cli)?;
    let handle = unlock(&service, section)?;
    output::print_entries_table(section, &service.list_entries(&handle)?);
    Ok(())
}
