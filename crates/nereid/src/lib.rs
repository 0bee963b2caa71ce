//! # Nereid: Incremental Symbol Indexing
//!
//! Nereid keeps an in-memory symbol database for a C-family project up to
//! date while files change. An external front end extracts per-file symbol
//! records; nereid rewrites their local indices into stable, content-derived
//! ids, diffs each file against what it contributed last time and applies
//! only the difference.
//!
//! ## Design Philosophy
//!
//! - **Incremental** - Applying a delta costs its size, never the database's size
//! - **Provenance-safe** - A symbol disappears only when no file mentions it any more
//! - **Engine agnostic** - Any [`ExtractionEngine`] can feed the pipeline
//! - **Cache first** - Unchanged files are replayed from disk without re-extraction
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use nereid::{CompilationDatabase, Config, Coordinator, DumpEngine, stable_id};
//!
//! let root = Path::new("/path/to/project");
//! let config = Config::load_for_project(root)?;
//! let project = Arc::new(CompilationDatabase::load(&root.join("compile_commands.json"))?);
//! let engine = Arc::new(DumpEngine::new(root.join(".nereid/dumps")));
//!
//! let pipeline = Coordinator::new(&config, root, project, engine)?;
//! pipeline.index_project()?;
//! pipeline.wait_idle();
//!
//! let uses = pipeline.read().uses_of(stable_id("c:@F@main#"));
//! println!("{} uses", uses.len());
//! pipeline.shutdown()?;
//! # Ok::<(), nereid::Error>(())
//! ```

pub mod config;
pub mod db;
pub mod delta;
pub mod engine;
pub mod error;
pub mod extract;
pub mod lru;
pub mod ownership;
pub mod path;
pub mod pipeline;
pub mod project;
pub mod remap;
pub mod session;
pub mod snapshot;
pub mod snapshot_cache;
pub mod stable_id;
pub mod timestamp;
pub mod types;

pub use config::{Config, PathFilter};
pub use db::{ApplyStats, DatabaseStats, Location, OutlineItem, SymbolDatabase, SymbolSummary, UseSite};
pub use delta::{Delta, FileDelta};
pub use engine::{DumpEngine, FixtureEngine};
pub use error::{Error, IndexError, IndexErrorKind, Result};
pub use extract::{EngineError, ExtractionEngine, RawEntry, RawExtractionRecord, UnsavedBuffers};
pub use pipeline::{Coordinator, Enqueued, IndexRequest, JobState, PipelineStats};
pub use project::{CompilationDatabase, ProjectConfig, StaticProject};
pub use snapshot::RemappedSnapshot;
pub use stable_id::stable_id;
pub use types::{Category, DefInfo, RelationKind, Role, Span, StableId, Use};
