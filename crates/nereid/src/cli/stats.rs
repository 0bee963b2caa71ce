//! `nereid stats` command implementation.

use colored::Colorize;

use super::Workspace;
use super::display::print_errors;

/// Run the stats command.
pub fn run(workspace: &Workspace) -> Result<(), nereid::Error> {
    let pipeline = workspace.load(false)?;
    let db = pipeline.read().stats();
    let stats = pipeline.shutdown()?;

    println!("{}", "Nereid Index Statistics".cyan().bold());
    println!();
    println!("  {}: {}", "Files".white().bold(), db.files.to_string().green());
    println!("  {}: {}", "Types".white().bold(), db.types.to_string().green());
    println!("  {}: {}", "Functions".white().bold(), db.funcs.to_string().green());
    println!("  {}: {}", "Variables".white().bold(), db.vars.to_string().green());
    println!("  {}: {}", "Uses".white().bold(), db.uses.to_string().green());
    println!(
        "  {}: {}",
        "Include edges".white().bold(),
        db.include_edges.to_string().green()
    );
    println!();
    println!(
        "  {}: {} applied, {} from cache, {} failed, {} coalesced",
        "Jobs".white().bold(),
        stats.applied,
        stats.from_cache,
        stats.failed,
        stats.coalesced
    );
    print_errors(&stats.errors);

    Ok(())
}
