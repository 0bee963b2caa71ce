//! Indexing requests and the states a request moves through.

use std::fmt;
use std::path::PathBuf;

/// A request to index one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRequest {
    /// File to index
    pub path: PathBuf,
    /// Re-extract even if nothing changed on disk (an explicit save or open)
    pub interactive: bool,
}

impl IndexRequest {
    /// A background request for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interactive: false,
        }
    }

    /// An interactive request for `path`.
    #[must_use]
    pub fn interactive(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interactive: true,
        }
    }
}

/// Where an accepted request currently is.
///
/// ```text
/// Queued -> Parsing -> Remapping -> Diffing -> MergeQueued -> Applied
///              |                                         \-> Failed
///              \-> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Waiting in a request queue
    Queued,
    /// Checking freshness or running the engine
    Parsing,
    /// Rewriting local indices to stable ids
    Remapping,
    /// Computing deltas against the database
    Diffing,
    /// Waiting for the merge thread
    MergeQueued,
    /// Delta applied
    Applied,
    /// Dropped after an error
    Failed,
}

impl JobState {
    /// Whether a worker has picked the request up and not yet finished it.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(
            self,
            Self::Parsing | Self::Remapping | Self::Diffing | Self::MergeQueued
        )
    }

    /// Whether the request has finished, successfully or not.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Applied | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::Parsing => "parsing",
            Self::Remapping => "remapping",
            Self::Diffing => "diffing",
            Self::MergeQueued => "merge-queued",
            Self::Applied => "applied",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What [`enqueue`](super::Coordinator::enqueue) did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// A new job was queued
    Accepted,
    /// Folded into a job already queued or running for the same path
    Coalesced,
    /// Rejected by the blacklist
    Filtered,
}
