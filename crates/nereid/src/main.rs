//! Nereid CLI - Symbol indexing from the command line.
//!
//! Nereid replays pre-extracted symbol records into an in-memory database,
//! reusing its on-disk cache for unchanged files, and answers queries from it.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

/// Nereid: incremental symbol indexing.
#[derive(Parser)]
#[command(name = "nereid")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Compilation database (defaults to `<workspace>/compile_commands.json`)
    #[arg(long, global = true)]
    compile_commands: Option<PathBuf>,

    /// Directory of extraction dumps (defaults to `<workspace>/.nereid/dumps`)
    #[arg(long, global = true)]
    dumps: Option<PathBuf>,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every file in the compilation database
    Index {
        /// Re-extract every file even if the cache is fresh
        #[arg(long)]
        force: bool,
    },

    /// List symbols declared or defined in a file
    Symbols {
        /// Source file
        file: PathBuf,

        /// Show definitions and declarations in source order
        #[arg(short, long)]
        outline: bool,
    },

    /// Show every use of a symbol
    Uses {
        /// Symbol signature (USR)
        usr: String,

        /// Only uses having this role (call, read, write, ...)
        #[arg(short, long)]
        role: Option<String>,
    },

    /// Show where a symbol is defined and declared
    Definition {
        /// Symbol signature (USR)
        usr: String,
    },

    /// Show database and pipeline statistics
    Stats,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = match cli.workspace {
        Some(w) => w,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!(
                    "{}: failed to get current directory: {e}",
                    "error".red().bold()
                );
                return ExitCode::FAILURE;
            }
        },
    };
    let workspace = cli::Workspace::new(root, cli.compile_commands, cli.dumps);

    let result = match cli.command {
        Commands::Index { force } => cli::index::run(&workspace, force),
        Commands::Symbols { file, outline } => cli::symbols::run(&workspace, &file, outline),
        Commands::Uses { usr, role } => cli::uses::run(&workspace, &usr, role.as_deref()),
        Commands::Definition { usr } => cli::definition::run(&workspace, &usr),
        Commands::Stats => cli::stats::run(&workspace),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  {}: {cause}", "caused by".dimmed());
                source = std::error::Error::source(cause);
            }
            ExitCode::FAILURE
        }
    }
}
