//! `nereid uses` command implementation.

use colored::Colorize;
use nereid::{Role, stable_id};

use super::Workspace;
use super::display::location;

/// Run the uses command.
pub fn run(workspace: &Workspace, usr: &str, role: Option<&str>) -> Result<(), nereid::Error> {
    let role = role
        .map(|name| {
            Role::from_name(name).ok_or_else(|| nereid::Error::Config(format!("unknown role '{name}'")))
        })
        .transpose()?;

    let id = stable_id(usr);
    let pipeline = workspace.load(false)?;

    {
        let db = pipeline.read();
        let uses = match role {
            Some(role) => db.uses_with_role(id, role),
            None => db.uses_of(id),
        };
        let name = db.def(id).map_or(usr, |def| def.name());
        println!("{} ({} uses):", name.white().bold(), uses.len());
        for site in uses {
            let at = location(
                workspace.root(),
                &nereid::Location {
                    path: site.path,
                    span: site.span,
                },
            );
            println!("  {} {} {}", "•".dimmed(), at, site.role.to_string().dimmed());
        }
    }

    pipeline.shutdown()?;
    Ok(())
}
