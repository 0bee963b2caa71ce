//! The extraction engine interface and its raw per-file output.
//!
//! An [`ExtractionEngine`] turns one translation unit into a
//! [`RawExtractionRecord`] for the main file and one for every header it
//! pulled in. Entries inside a record refer to each other by
//! [`LocalIndex`], which means nothing outside that record; cross-file
//! references use signatures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::Timestamp;
use crate::types::{Category, Span, StorageClass, Use};

/// Editor-supplied contents for files that differ from disk.
pub type UnsavedBuffers = HashMap<PathBuf, String>;

/// Failure reported by an extraction engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
    /// Human-readable description
    pub message: String,
}

impl EngineError {
    /// Create an engine error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An opaque semantic-analysis front end.
///
/// Implementations must be callable from several worker threads at once.
pub trait ExtractionEngine: Send + Sync {
    /// Extract symbol records for `path` and every file it includes.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the file cannot be analyzed.
    fn extract(
        &self,
        path: &Path,
        args: &[String],
        unsaved: &UnsavedBuffers,
    ) -> Result<Vec<RawExtractionRecord>, EngineError>;
}

/// Index of an entry within a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalIndex(pub u32);

/// A reference from one entry to another symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawRef {
    /// Another entry in the same record.
    Local(LocalIndex),
    /// A symbol known only by signature.
    External(String),
    /// A builtin type, by spelling (`int`, `unsigned long`, ...).
    Builtin(String),
}

/// Definition location of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDefinition {
    /// The defining name token
    pub spell: Span,
    /// The whole definition
    pub extent: Span,
}

/// One symbol as seen from one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Record-local index
    pub index: LocalIndex,
    /// Symbol category
    pub category: Category,
    /// Globally unique signature; empty when the engine could not produce one
    pub usr: String,
    /// Qualified display name
    #[serde(default)]
    pub detailed_name: String,
    /// Byte offset of the short name in `detailed_name`
    #[serde(default)]
    pub short_name_offset: u16,
    /// Byte length of the short name
    #[serde(default)]
    pub short_name_len: u16,
    /// Storage class
    #[serde(default)]
    pub storage: StorageClass,
    /// Declaration locations in this file
    #[serde(default)]
    pub declarations: Vec<Span>,
    /// Definition location, if this file defines the symbol
    #[serde(default)]
    pub definition: Option<RawDefinition>,
    /// Enclosing type
    #[serde(default)]
    pub declaring_type: Option<RawRef>,
    /// Declared type of a variable
    #[serde(default)]
    pub value_type: Option<RawRef>,
    /// Base classes or overridden methods
    #[serde(default)]
    pub bases: Vec<RawRef>,
    /// Functions called from this function
    #[serde(default)]
    pub callees: Vec<RawRef>,
    /// Uses of this symbol in this file
    #[serde(default)]
    pub uses: Vec<Use>,
}

impl RawEntry {
    /// A bare entry with only identity fields set.
    #[must_use]
    pub fn new(index: u32, category: Category, usr: impl Into<String>) -> Self {
        Self {
            index: LocalIndex(index),
            category,
            usr: usr.into(),
            detailed_name: String::new(),
            short_name_offset: 0,
            short_name_len: 0,
            storage: StorageClass::None,
            declarations: Vec::new(),
            definition: None,
            declaring_type: None,
            value_type: None,
            bases: Vec::new(),
            callees: Vec::new(),
            uses: Vec::new(),
        }
    }
}

/// A file the record's file includes directly, with the modification time
/// the engine observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDependency {
    /// Absolute path of the included file
    pub path: PathBuf,
    /// Modification time when it was read
    pub last_modified: Option<Timestamp>,
}

/// One file's worth of engine output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExtractionRecord {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Modification time of the file when it was read
    pub last_modified: Timestamp,
    /// Text that was analyzed
    #[serde(default)]
    pub text: String,
    /// Arguments the translation unit was compiled with
    #[serde(default)]
    pub args: Vec<String>,
    /// Direct includes
    #[serde(default)]
    pub dependencies: Vec<RawDependency>,
    /// Symbols seen in the file
    #[serde(default)]
    pub entries: Vec<RawEntry>,
}
