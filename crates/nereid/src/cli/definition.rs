//! `nereid definition` command implementation.

use colored::Colorize;
use nereid::stable_id;

use super::Workspace;
use super::display::location;

/// Run the definition command.
pub fn run(workspace: &Workspace, usr: &str) -> Result<(), nereid::Error> {
    let id = stable_id(usr);
    let pipeline = workspace.load(false)?;

    {
        let db = pipeline.read();
        match db.definition_of(id) {
            Some(definition) => println!(
                "{} {}",
                "Defined at".green().bold(),
                location(workspace.root(), &definition)
            ),
            None => println!("{} no definition indexed for {usr}", "Note:".yellow()),
        }
        let declarations = db.declarations_of(id);
        if !declarations.is_empty() {
            println!("{}:", "Declared at".white().bold());
            for declaration in &declarations {
                println!("  {} {}", "•".dimmed(), location(workspace.root(), declaration));
            }
        }
    }

    pipeline.shutdown()?;
    Ok(())
}
