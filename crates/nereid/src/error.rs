//! Error types for nereid operations.
//!
//! Two layers of errors:
//!
//! - **`Error`**: Top-level errors that halt an operation (bad configuration,
//!   a background thread that died, an unreadable project file)
//! - **`IndexError`**: Per-file pipeline failures that are collected and
//!   reported but never stop other files from being indexed
//!
//! ## Blame
//!
//! `IndexErrorKind` splits per-file failures the way HTTP splits 4xx from 5xx:
//! - Input problems (the project's fault): the engine rejected the file, the file vanished
//! - Internal problems (our fault): cache writes failed, internal invariants broke

use std::path::PathBuf;
use thiserror::Error;

use crate::extract::EngineError;

/// Result type for nereid operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for nereid operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing a project file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache store operation failed
    #[error("cache error: {0}")]
    Cache(#[from] nereid_cache::Error),

    /// Bad configuration file, environment override or compile database
    #[error("configuration error: {0}")]
    Config(String),

    /// The extraction engine failed outside of a pipeline job
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// A background thread or lock failed
    #[error("internal error: {0}")]
    Internal(String),
}

/// A failure confined to one indexing request.
///
/// These errors are collected by the pipeline; the failed request is dropped
/// and every other request proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexError {
    /// Path of the request that failed
    pub path: PathBuf,
    /// Which stage failed
    pub kind: IndexErrorKind,
    /// What went wrong, for logs and the CLI
    pub message: String,
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.path.display(),
            self.message,
            self.kind
        )
    }
}

impl std::error::Error for IndexError {}

/// Who is to blame for an [`IndexError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexErrorKind {
    // === Input problems ===
    /// The extraction engine returned an error
    EngineFailed,

    /// The file disappeared from disk during the run
    FileVanished,

    // === Internal problems ===
    /// Persisting the snapshot to the cache store failed
    CacheWrite,

    /// A pipeline invariant or background thread failed
    Internal,
}

impl std::fmt::Display for IndexErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EngineFailed => write!(f, "engine failed"),
            Self::FileVanished => write!(f, "file vanished"),
            Self::CacheWrite => write!(f, "cache write failed"),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

impl IndexErrorKind {
    /// The project's fault: fixing the source or build fixes it.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::EngineFailed | Self::FileVanished)
    }

    /// Nereid's fault: the cache directory or the pipeline itself.
    #[must_use]
    pub fn is_internal_error(&self) -> bool {
        matches!(self, Self::CacheWrite | Self::Internal)
    }
}

impl IndexError {
    /// An error of any kind.
    #[must_use]
    pub fn new(path: PathBuf, kind: IndexErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// The engine rejected the file.
    #[must_use]
    pub fn engine_failed(path: PathBuf, error: &EngineError) -> Self {
        Self::new(path, IndexErrorKind::EngineFailed, error.to_string())
    }

    /// The file could not be found on disk when the job ran.
    #[must_use]
    pub fn file_vanished(path: PathBuf) -> Self {
        Self::new(path, IndexErrorKind::FileVanished, "file no longer exists")
    }

    /// A cache write failed after the delta was applied.
    #[must_use]
    pub fn cache_write(path: PathBuf, error: &nereid_cache::Error) -> Self {
        Self::new(path, IndexErrorKind::CacheWrite, error.to_string())
    }
}
