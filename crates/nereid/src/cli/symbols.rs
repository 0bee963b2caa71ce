//! `nereid symbols` command implementation.

use std::path::Path;

use colored::Colorize;

use super::Workspace;
use super::display::location;

/// Run the symbols command.
pub fn run(workspace: &Workspace, file: &Path, outline: bool) -> Result<(), nereid::Error> {
    let path = nereid::path::normalize_against(workspace.root(), file);
    let pipeline = workspace.load(false)?;

    {
        let db = pipeline.read();
        if db.file(&path).is_none() {
            println!("{} {} is not indexed", "Note:".yellow(), file.display());
        } else if outline {
            for item in db.outline(&path) {
                let marker = if item.is_definition { "def" } else { "decl" };
                println!(
                    "  {:>4} {:>5} {} {}",
                    item.span.start_line.to_string().dimmed(),
                    marker.cyan(),
                    item.category.as_str().dimmed(),
                    item.name
                );
            }
        } else {
            let symbols = db.symbols_in_file(&path);
            println!("{} ({}):", file.display().to_string().white().bold(), symbols.len());
            for symbol in symbols {
                let at = symbol
                    .definition
                    .as_ref()
                    .map(|l| location(workspace.root(), l))
                    .unwrap_or_default();
                println!(
                    "  {} {} {}",
                    symbol.category.as_str().dimmed(),
                    symbol.name.green(),
                    at.dimmed()
                );
            }
        }
    }

    pipeline.shutdown()?;
    Ok(())
}
