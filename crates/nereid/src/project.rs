//! Project collaborators: which files belong to the project and how each is
//! compiled.
//!
//! [`CompilationDatabase`] reads a `compile_commands.json`. Files that have no
//! entry of their own (usually headers) borrow the arguments of the entry whose
//! path shares the longest directory prefix with them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::path::{normalize, normalize_against};

/// Source of per-file compiler arguments and the project's file list.
pub trait ProjectConfig: Send + Sync {
    /// Arguments to extract `path` with.
    fn args_for(&self, path: &Path) -> Vec<String>;

    /// Every file that belongs to the project.
    fn files(&self) -> Vec<PathBuf>;

    /// Whether `path` is a project file (has its own compile entry).
    fn contains(&self, path: &Path) -> bool {
        self.files().iter().any(|f| f == path)
    }
}

/// One entry of `compile_commands.json`.
#[derive(Debug, Deserialize)]
struct CompileCommand {
    directory: PathBuf,
    file: PathBuf,
    #[serde(default)]
    arguments: Option<Vec<String>>,
    #[serde(default)]
    command: Option<String>,
}

/// A project described by a `compile_commands.json` file.
#[derive(Debug, Clone, Default)]
pub struct CompilationDatabase {
    entries: BTreeMap<PathBuf, Vec<String>>,
}

impl CompilationDatabase {
    /// Load `compile_commands.json`.
    ///
    /// Entries whose `command` cannot be split, or that carry neither
    /// `arguments` nor `command`, are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON array of
    /// compile commands.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Parse the contents of a `compile_commands.json` file.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if `content` is not an array of compile commands.
    pub fn parse(content: &str) -> std::result::Result<Self, serde_json::Error> {
        let commands: Vec<CompileCommand> = serde_json::from_str(content)?;
        let mut entries = BTreeMap::new();
        for command in commands {
            let file = normalize_against(&normalize(&command.directory), &command.file);
            let args = match (command.arguments, command.command) {
                (Some(arguments), _) => arguments,
                (None, Some(line)) => {
                    if let Some(args) = shlex::split(&line) {
                        args
                    } else {
                        warn!(file = %file.display(), "Skipping compile command with unbalanced quotes");
                        continue;
                    }
                }
                (None, None) => {
                    warn!(file = %file.display(), "Skipping compile command without arguments");
                    continue;
                }
            };
            entries.insert(file, args);
        }
        debug!(files = entries.len(), "Loaded compilation database");
        Ok(Self { entries })
    }

    /// Number of files with their own entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the database has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn closest_entry(&self, path: &Path) -> Option<&Vec<String>> {
        self.entries
            .iter()
            .max_by_key(|(file, _)| common_prefix_len(file, path))
            .map(|(_, args)| args)
    }
}

fn common_prefix_len(a: &Path, b: &Path) -> usize {
    a.components()
        .zip(b.components())
        .take_while(|(x, y)| x == y)
        .count()
}

impl ProjectConfig for CompilationDatabase {
    fn args_for(&self, path: &Path) -> Vec<String> {
        self.entries
            .get(path)
            .or_else(|| self.closest_entry(path))
            .cloned()
            .unwrap_or_default()
    }

    fn files(&self) -> Vec<PathBuf> {
        self.entries.keys().cloned().collect()
    }

    fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }
}

/// A fixed set of files sharing one argument list.
#[derive(Debug, Clone, Default)]
pub struct StaticProject {
    files: Vec<PathBuf>,
    args: Vec<String>,
}

impl StaticProject {
    /// A project of `files`, each compiled with `args`.
    #[must_use]
    pub fn new(files: Vec<PathBuf>, args: Vec<String>) -> Self {
        Self { files, args }
    }
}

impl ProjectConfig for StaticProject {
    fn args_for(&self, _path: &Path) -> Vec<String> {
        self.args.clone()
    }

    fn files(&self) -> Vec<PathBuf> {
        self.files.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMANDS: &str = r#"[
        {
            "directory": "/proj/build",
            "file": "../src/a.cc",
            "arguments": ["clang++", "-std=c++17", "-c", "../src/a.cc"]
        },
        {
            "directory": "/proj",
            "file": "/proj/lib/b.cc",
            "command": "clang++ -DNAME=\"two words\" -Iinclude -c lib/b.cc"
        },
        {
            "directory": "/proj",
            "file": "broken.cc"
        }
    ]"#;

    #[test]
    fn parses_arguments_and_commands() {
        let db = CompilationDatabase::parse(COMMANDS).unwrap();

        assert_eq!(db.len(), 2);
        assert_eq!(db.args_for(Path::new("/proj/src/a.cc"))[1], "-std=c++17");
        assert_eq!(
            db.args_for(Path::new("/proj/lib/b.cc")),
            vec!["clang++", "-DNAME=two words", "-Iinclude", "-c", "lib/b.cc"]
        );
    }

    #[test]
    fn relative_file_resolves_against_directory() {
        let db = CompilationDatabase::parse(COMMANDS).unwrap();

        assert!(db.contains(Path::new("/proj/src/a.cc")));
        assert!(!db.contains(Path::new("/proj/broken.cc")));
    }

    #[test]
    fn headers_borrow_closest_entry() {
        let db = CompilationDatabase::parse(COMMANDS).unwrap();

        let args = db.args_for(Path::new("/proj/lib/b.h"));
        assert_eq!(args.last().map(String::as_str), Some("lib/b.cc"));
        assert!(!db.contains(Path::new("/proj/lib/b.h")));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compile_commands.json");
        std::fs::write(&path, "{\"not\": \"an array\"}").unwrap();

        assert!(matches!(CompilationDatabase::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn static_project_shares_args() {
        let project = StaticProject::new(vec![PathBuf::from("/a.cc")], vec!["-O2".to_string()]);

        assert_eq!(project.args_for(Path::new("/anything.h")), vec!["-O2"]);
        assert!(project.contains(Path::new("/a.cc")));
        assert!(!project.contains(Path::new("/b.cc")));
    }
}
