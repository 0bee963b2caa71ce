//! CLI command implementations.

mod display;

pub mod definition;
pub mod index;
pub mod stats;
pub mod symbols;
pub mod uses;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use nereid::config::NEREID_DIR_NAME;
use nereid::{CompilationDatabase, Config, Coordinator, DumpEngine, IndexRequest, ProjectConfig};

/// Where a command finds its project, compile commands and dumps.
pub struct Workspace {
    root: PathBuf,
    compile_commands: PathBuf,
    dumps: PathBuf,
}

impl Workspace {
    /// Resolve defaults against `root`.
    pub fn new(root: PathBuf, compile_commands: Option<PathBuf>, dumps: Option<PathBuf>) -> Self {
        let root = nereid::path::normalize(&root);
        Self {
            compile_commands: compile_commands.unwrap_or_else(|| root.join("compile_commands.json")),
            dumps: dumps.unwrap_or_else(|| root.join(NEREID_DIR_NAME).join("dumps")),
            root,
        }
    }

    /// The normalized project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a pipeline and bring the database up to date with every project
    /// file. Fresh files are replayed from the cache.
    pub fn load(&self, force: bool) -> Result<Coordinator, nereid::Error> {
        let config = Config::load_for_project(&self.root)?;
        let project = Arc::new(CompilationDatabase::load(&self.compile_commands)?);
        let engine = Arc::new(DumpEngine::new(&self.dumps));
        let pipeline = Coordinator::new(&config, &self.root, Arc::clone(&project) as Arc<dyn ProjectConfig>, engine)?;

        if force {
            for file in project.files() {
                pipeline.enqueue(IndexRequest::interactive(file))?;
            }
        } else {
            pipeline.index_project()?;
        }
        pipeline.wait_idle();
        Ok(pipeline)
    }
}
