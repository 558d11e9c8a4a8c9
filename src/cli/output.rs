//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::vault::{EntrySummary, SectionSummary};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a table of sections (Section, Owner, Entries).
pub fn print_sections_table(sections: &[SectionSummary]) {
    if sections.is_empty() {
        info("No sections in this vault yet.");
        tip("Run `valve section create <NAME> --owner <OWNER>` to add one.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Section", "Owner", "Entries"]);

    for s in sections {
        table.add_row(vec![
            s.name.clone(),
            s.owner.clone(),
            s.entry_count.to_string(),
        ]);
    }

    println!("{table}");
}

/// Print a table of entries (Entry, Fields).
pub fn print_entries_table(section: &str, entries: &[EntrySummary]) {
    if entries.is_empty() {
        info(&format!("Section '{section}' has no entries yet."));
        tip("Run `valve add <SECTION> <ENTRY> FIELD=VALUE` to add one.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Entry", "Fields"]);

    for e in entries {
        table.add_row(vec![e.name.clone(), e.fields.join(", ")]);
    }

    println!("{table}");
}
