//! `valve get`: decrypt and print an entry.

use crate::cli::{open_service, unlock, Cli};
use crate::errors::{Result, VaultError};
use crate::vault::zeroize_fields;

/// Execute the `get` command.
pub fn execute(cli: &Cli, section: &str, entry: &str, field: Option<&str>) -> Result<()> {
    let service = open_service(cli)?;
    let handle = unlock(&service, section)?;

    let mut fields = service.read_entry(&handle, entry)?;
    service.lock(&handle);

    let result = match field {
        Some(name) => match fields.get(name) {
            Some(value) => {
                println!("{value}");
                Ok(())
            }
            None => Err(VaultError::NotFound {
                kind: "Field",
                name: name.to_string(),
            }),
        },
        None => {
            for (name, value) in &fields {
                println!("{name}={value}");
            }
            Ok(())
        }
    };

    zeroize_fields(&mut fields);
    result
}
