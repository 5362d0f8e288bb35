pub use crate::error::Error;

pub use anstream::eprintln;
pub use anstream::println;
pub use color_eyre::eyre::{eyre, Context, Result};
pub use colored::Colorize;
pub use std::format as f;

/// Marker for a finished step.
pub fn done_mark() -> colored::ColoredString {
    "✓".green()
}

/// Marker for a failed step.
pub fn fail_mark() -> colored::ColoredString {
    "✗".red()
}

/// Marker for something skipped or missing.
pub fn warn_mark() -> colored::ColoredString {
    "!".yellow()
}

pub fn new_table() -> prettytable::Table {
    let mut table = prettytable::Table::new();

    let format = prettytable::format::FormatBuilder::new()
        .padding(1, 1)
        .build();

    table.set_format(format);

    table
}
