//! Configuration loading.
//!
//! Configuration lives in `<project>/.nereid/config.yaml`. Every field has a
//! default, so a missing file or a partial file is fine. Environment
//! variables override the file:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `NEREID_CACHE_DIR` | `cache-dir` |
//! | `NEREID_CACHE_FORMAT` | `cache-format` |
//! | `NEREID_THREADS` | `index-threads` |

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use nereid_cache::CacheFormat;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Directory under the project root holding nereid state.
pub const NEREID_DIR_NAME: &str = ".nereid";

/// Configuration file name inside [`NEREID_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Indexer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Cache root; relative paths resolve against the project root.
    /// Defaults to `.nereid/cache`.
    pub cache_dir: Option<PathBuf>,
    /// Snapshot file format
    pub cache_format: CacheFormat,
    /// Consult the cache before re-parsing
    pub enable_cache_read: bool,
    /// Persist snapshots after applying them
    pub enable_cache_write: bool,
    /// Worker threads; 0 means one per available core
    pub index_threads: usize,
    /// Capacity of each request queue
    pub queue_capacity: usize,
    /// Most finished jobs merged into one database apply
    pub merge_batch_size: usize,
    /// Decoded cache entries kept in memory
    pub snapshot_cache_capacity: usize,
    /// Paths always indexed (globs)
    pub whitelist: Vec<String>,
    /// Paths never indexed unless whitelisted (globs)
    pub blacklist: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            cache_format: CacheFormat::Binary,
            enable_cache_read: true,
            enable_cache_write: true,
            index_threads: 0,
            queue_capacity: 256,
            merge_batch_size: 32,
            snapshot_cache_capacity: 64,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        serde_yaml::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Load `<project_root>/.nereid/config.yaml`, apply environment
    /// overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, malformed or invalid, or
    /// an environment override cannot be parsed.
    pub fn load_for_project(project_root: &Path) -> Result<Self> {
        let mut config = Self::load(&project_root.join(NEREID_DIR_NAME).join(CONFIG_FILE_NAME))?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `NEREID_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an override has an unparseable value.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `NEREID_*` overrides looked up through `var`.
    ///
    /// # Errors
    ///
    /// Returns an error if an override has an unparseable value.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = var("NEREID_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(format) = var("NEREID_CACHE_FORMAT") {
            self.cache_format = format
                .parse()
                .map_err(|e: nereid_cache::Error| Error::Config(e.to_string()))?;
        }
        if let Some(threads) = var("NEREID_THREADS") {
            self.index_threads = threads
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("NEREID_THREADS: {e}")))?;
        }
        Ok(())
    }

    /// Check field values and glob syntax.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue-capacity must be at least 1".to_string()));
        }
        if self.merge_batch_size == 0 {
            return Err(Error::Config("merge-batch-size must be at least 1".to_string()));
        }
        if self.snapshot_cache_capacity == 0 {
            return Err(Error::Config(
                "snapshot-cache-capacity must be at least 1".to_string(),
            ));
        }
        self.path_filter().map(|_| ())
    }

    /// The cache root for a project.
    #[must_use]
    pub fn cache_dir_for(&self, project_root: &Path) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => project_root.join(dir),
            None => project_root.join(NEREID_DIR_NAME).join("cache"),
        }
    }

    /// Number of worker threads to start.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        if self.index_threads > 0 {
            return self.index_threads;
        }
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    }

    /// Compile the white- and blacklists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a glob is malformed.
    pub fn path_filter(&self) -> Result<PathFilter> {
        Ok(PathFilter {
            whitelist: build_globs(&self.whitelist)?,
            blacklist: build_globs(&self.blacklist)?,
            blacklist_patterns: self.blacklist.clone(),
        })
    }
}

fn build_globs(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| Error::Config(format!("invalid glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("invalid glob set: {e}")))
}

/// Decides which paths may be indexed.
///
/// A whitelisted path is always allowed. Otherwise a blacklisted path is
/// rejected. Everything else is allowed.
#[derive(Debug, Clone)]
pub struct PathFilter {
    whitelist: GlobSet,
    blacklist: GlobSet,
    blacklist_patterns: Vec<String>,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self {
            whitelist: GlobSet::empty(),
            blacklist: GlobSet::empty(),
            blacklist_patterns: Vec::new(),
        }
    }
}

impl PathFilter {
    /// Whether `path` may be indexed.
    #[must_use]
    pub fn allows(&self, path: &Path) -> bool {
        self.rejection(path).is_none()
    }

    /// The blacklist glob rejecting `path`, if any.
    #[must_use]
    pub fn rejection(&self, path: &Path) -> Option<&str> {
        if self.whitelist.is_match(path) {
            return None;
        }
        self.blacklist
            .matches(path)
            .first()
            .and_then(|index| self.blacklist_patterns.get(*index))
            .map(String::as_str)
    }
}
