use clap::Parser;
use tracing_subscriber::EnvFilter;
use valve::cli::{Cli, Commands, SectionAction};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init => valve::cli::commands::init::execute(&cli),
        Commands::Section { ref action } => match action {
            SectionAction::Create { name, owner } => {
                valve::cli::commands::section::create(&cli, name, owner)
            }
            SectionAction::Delete { name, force } => {
                valve::cli::commands::section::delete(&cli, name, *force)
            }
            SectionAction::List => valve::cli::commands::section::list(&cli),
        },
        Commands::Add {
            ref section,
            ref entry,
            ref fields,
        } => valve::cli::commands::add::execute(&cli, section, entry, fields),
        Commands::Get {
            ref section,
            ref entry,
            ref field,
        } => valve::cli::commands::get::execute(&cli, section, entry, field.as_deref()),
        Commands::Entries { ref section } => {
            valve::cli::commands::entries::execute(&cli, section)
        }
        Commands::Delete {
            ref section,
            ref entry,
            force,
        } => valve::cli::commands::delete::execute(&cli, section, entry, force),
        Commands::RotateKey { ref section } => {
            valve::cli::commands::rotate::execute(&cli, section)
        }
    };

    if let Err(e) = result {
        valve::cli::output::error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "valve=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
