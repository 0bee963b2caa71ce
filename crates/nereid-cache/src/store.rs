//! The on-disk cache store.
//!
//! Each cached source file owns two files under the cache root:
//!
//! ```text
//! <root>/<slot>          raw source text, written verbatim
//! <root>/<slot>.<ext>    versioned envelope holding the snapshot payload
//! ```
//!
//! where `<slot>` is [`slot_name`](crate::slot_name) of the source path and
//! `<ext>` is selected by [`CacheFormat`]. Both files are replaced atomically.
//! The envelope records a hash of the text it was saved with; a load that
//! finds text from a different save reads as `None`.
//!
//! Loads never fail loudly: a missing slot, a corrupt file, an envelope from a
//! different major schema version, or a slot that turns out to belong to a
//! different source path all read as `None`.

use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_64;

use crate::atomic::write_atomic;
use crate::format::CacheFormat;
use crate::key::slot_name;
use crate::Result;

/// Schema version embedded in every envelope.
///
/// Entries whose `major` differs from the running store's are discarded on
/// load. `minor` bumps are compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Incompatible layout revision.
    pub major: u32,
    /// Compatible revision.
    pub minor: u32,
}

impl SchemaVersion {
    /// Create a schema version.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

/// A cached file: its snapshot payload, raw text and modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    /// Modification time of the source file when it was indexed (ns since epoch).
    pub last_modified: i64,
    /// Raw file text at index time.
    pub text: String,
    /// Serialized snapshot.
    pub payload: T,
}

// Field order matters: `EnvelopeHeader` must stay a prefix of `Envelope`.
#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: SchemaVersion,
    source_path: &'a str,
    last_modified: i64,
    text_hash: u64,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: SchemaVersion,
    source_path: String,
    last_modified: i64,
    text_hash: u64,
    payload: T,
}

#[derive(Deserialize)]
struct EnvelopeHeader {
    version: SchemaVersion,
    source_path: String,
    last_modified: i64,
}

/// Versioned per-file cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    format: CacheFormat,
    version: SchemaVersion,
}

impl CacheStore {
    /// Create a store. The root directory is created lazily on first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, format: CacheFormat, version: SchemaVersion) -> Self {
        Self {
            root: root.into(),
            format,
            version,
        }
    }

    /// The cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The format used for snapshot files.
    #[must_use]
    pub fn format(&self) -> CacheFormat {
        self.format
    }

    /// The schema version written by this store.
    #[must_use]
    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// Path of the raw-text file for `source`.
    #[must_use]
    pub fn text_path(&self, source: &Path) -> PathBuf {
        self.root.join(slot_name(source))
    }

    /// Path of the snapshot envelope for `source`.
    #[must_use]
    pub fn entry_path(&self, source: &Path) -> PathBuf {
        let mut name = slot_name(source);
        name.push('.');
        name.push_str(self.format.extension());
        self.root.join(name)
    }

    /// Load the cached entry for `source`.
    ///
    /// Returns `None` when there is no usable entry.
    #[must_use]
    pub fn load<T: DeserializeOwned>(&self, source: &Path) -> Option<CacheEntry<T>> {
        let entry_path = self.entry_path(source);
        let bytes = read_slot(&entry_path)?;
        self.accept_header(source, &entry_path, &bytes)?;

        let envelope: Envelope<T> = match self.format.decode(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(slot = %entry_path.display(), error = %e, "Discarding undecodable cache entry");
                return None;
            }
        };

        let text_path = self.text_path(source);
        let text = match read_slot(&text_path).map(String::from_utf8) {
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                debug!(slot = %text_path.display(), error = %e, "Cached text is not UTF-8");
                return None;
            }
            None => return None,
        };
        if xxh3_64(text.as_bytes()) != envelope.text_hash {
            debug!(slot = %entry_path.display(), "Cached text and snapshot come from different saves");
            return None;
        }

        debug_assert_eq!(envelope.version.major, self.version.major);
        debug_assert_eq!(envelope.source_path, source.to_string_lossy());
        Some(CacheEntry {
            last_modified: envelope.last_modified,
            text,
            payload: envelope.payload,
        })
    }

    /// Load only the cached raw text for `source`.
    #[must_use]
    pub fn load_text(&self, source: &Path) -> Option<String> {
        read_slot(&self.text_path(source)).and_then(|b| String::from_utf8(b).ok())
    }

    /// Modification time recorded in the cached entry, without decoding the payload.
    #[must_use]
    pub fn cached_modification_time(&self, source: &Path) -> Option<i64> {
        let entry_path = self.entry_path(source);
        let bytes = read_slot(&entry_path)?;
        self.accept_header(source, &entry_path, &bytes)
            .map(|header| header.last_modified)
    }

    /// Whether a usable entry exists whose recorded modification time equals `last_modified`.
    #[must_use]
    pub fn has_fresh_copy(&self, source: &Path, last_modified: i64) -> bool {
        self.cached_modification_time(source) == Some(last_modified)
    }

    /// Persist `entry` for `source`, replacing any previous entry.
    ///
    /// The two files are replaced one after the other. A concurrent load that
    /// sees one new file and one old file reads as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload fails to serialize or either file
    /// cannot be written.
    pub fn save<T: Serialize>(&self, source: &Path, entry: &CacheEntry<T>) -> Result<()> {
        let source_path = source.to_string_lossy();
        let bytes = self.format.encode(&EnvelopeRef {
            version: self.version,
            source_path: &source_path,
            last_modified: entry.last_modified,
            text_hash: xxh3_64(entry.text.as_bytes()),
            payload: &entry.payload,
        })?;

        write_atomic(&self.text_path(source), entry.text.as_bytes())?;
        write_atomic(&self.entry_path(source), &bytes)?;

        trace!(source = %source.display(), bytes = bytes.len(), "Saved cache entry");
        Ok(())
    }

    /// Delete both files of the slot for `source`. Missing files are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn remove(&self, source: &Path) -> Result<()> {
        for path in [self.entry_path(source), self.text_path(source)] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn accept_header(&self, source: &Path, entry_path: &Path, bytes: &[u8]) -> Option<EnvelopeHeader> {
        let header: EnvelopeHeader = match self.format.decode_prefix(bytes) {
            Ok(header) => header,
            Err(e) => {
                debug!(slot = %entry_path.display(), error = %e, "Discarding corrupt cache entry");
                return None;
            }
        };

        if header.version.major != self.version.major {
            debug!(
                slot = %entry_path.display(),
                found = header.version.major,
                expected = self.version.major,
                "Discarding cache entry from incompatible schema version"
            );
            return None;
        }

        if header.source_path != source.to_string_lossy() {
            debug!(
                slot = %entry_path.display(),
                owner = %header.source_path,
                "Cache slot belongs to a different source path"
            );
            return None;
        }

        Some(header)
    }
}

fn read_slot(path: &Path) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            trace!(slot = %path.display(), "Cache miss");
            None
        }
        Err(e) => {
            debug!(slot = %path.display(), error = %e, "Failed to read cache slot");
            None
        }
    }
}
