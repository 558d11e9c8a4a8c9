//! `valve add`: encrypt and store a new entry.

use crate::cli::output;
use crate::cli::{open_service, prompt_password, unlock, Cli};
use crate::errors::{Result, VaultError};
use crate::vault::{zeroize_fields, Fields};

/// Execute the `add` command.
pub fn execute(cli: &Cli, section: &str, entry: &str, raw_fields: &[String]) -> Result<()> {
    let service = open_service(cli)?;
    let handle = unlock(&service, section)?;

    let mut fields = Fields::new();
    let mut inline = false;
    for raw in raw_fields {
        let (name, value) = match raw.split_once('=') {
            Some((name, value)) => {
                inline = true;
                (name.to_string(), value.to_string())
            }
            None => {
                let value = prompt_password(&format!("Value for {raw}"))?;
                (raw.clone(), value.to_string())
            }
        };
        if fields.insert(name.clone(), value).is_some() {
            zeroize_fields(&mut fields);
            return Err(VaultError::CommandFailed(format!(
                "field '{name}' given more than once"
            )));
        }
    }
    if inline {
        output::warning("Values provided on the command line may appear in shell history.");
    }

    let field_count = fields.len();
    let result = service.add_entry(&handle, entry, &fields);
    zeroize_fields(&mut fields);
    result?;
    service.save()?;

    output::success(&format!(
        "Added entry '{entry}' to section '{section}' ({field_count} field(s))"
    ));
    Ok(())
}
