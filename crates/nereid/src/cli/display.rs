//! Common display utilities for CLI commands.

use std::path::Path;

use colored::Colorize;
use nereid::{IndexError, Location};

const MAX_DISPLAY_ITEMS: usize = 5;

/// Print `path:line:column` for a location, relative to `root` when possible.
pub fn location(root: &Path, location: &Location) -> String {
    let path = location.path.strip_prefix(root).unwrap_or(location.path.as_path());
    format!(
        "{}:{}:{}",
        path.display(),
        location.span.start_line,
        location.span.start_column
    )
}

/// Print up to a handful of per-file errors.
pub fn print_errors(errors: &[IndexError]) {
    if errors.is_empty() {
        return;
    }
    println!();
    println!("{} ({}):", "Errors".red().bold(), errors.len());
    for err in errors.iter().take(MAX_DISPLAY_ITEMS) {
        println!("  {} {}: {} ({})", "•".red(), err.path.display(), err.message, err.kind);
    }
    if errors.len() > MAX_DISPLAY_ITEMS {
        println!("  ... and {} more", errors.len() - MAX_DISPLAY_ITEMS);
    }
}
