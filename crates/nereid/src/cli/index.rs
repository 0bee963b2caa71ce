//! `nereid index` command implementation.

use std::time::Instant;

use colored::Colorize;

use super::Workspace;
use super::display::print_errors;

/// Run the index command.
pub fn run(workspace: &Workspace, force: bool) -> Result<(), nereid::Error> {
    println!("{} {}...", "Indexing".cyan().bold(), workspace.root().display());
    if force {
        println!("{}", "Re-extracting every file".yellow());
    }

    let started = Instant::now();
    let pipeline = workspace.load(force)?;
    let db_stats = pipeline.read().stats();
    let stats = pipeline.shutdown()?;

    println!();
    println!(
        "{} {} files: {} types, {} functions, {} variables, {} uses",
        "Indexed".green().bold(),
        db_stats.files,
        db_stats.types,
        db_stats.funcs,
        db_stats.vars,
        db_stats.uses
    );
    println!("{}: {:.2?}", "Duration".dimmed(), started.elapsed());

    if stats.from_cache > 0 {
        println!(
            "{}: {} files (unchanged since last index)",
            "From cache".dimmed(),
            stats.from_cache
        );
    }
    if stats.filtered > 0 {
        println!("{}: {} files (blacklisted)", "Skipped".yellow(), stats.filtered);
    }
    print_errors(&stats.errors);

    Ok(())
}
