//! Versioned, atomically written per-file cache slots.
//!
//! The store maps a normalized source path to a slot under a cache root and
//! keeps two files there: the raw text that was indexed and a schema-versioned
//! envelope around a caller-defined snapshot payload.
//!
//! ```no_run
//! use nereid_cache::{CacheEntry, CacheFormat, CacheStore, SchemaVersion};
//! use std::path::Path;
//!
//! let store = CacheStore::new("/tmp/cache", CacheFormat::Json, SchemaVersion::new(1, 0));
//! let entry = CacheEntry {
//!     last_modified: 42,
//!     text: "int main() {}".to_string(),
//!     payload: vec![1u64, 2, 3],
//! };
//! store.save(Path::new("/src/main.cc"), &entry)?;
//!
//! let loaded: Option<CacheEntry<Vec<u64>>> = store.load(Path::new("/src/main.cc"));
//! assert_eq!(loaded, Some(entry));
//! # Ok::<(), nereid_cache::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod atomic;
pub mod error;
pub mod format;
pub mod key;
pub mod store;

pub use atomic::write_atomic;
pub use error::{Error, Result};
pub use format::CacheFormat;
pub use key::slot_name;
pub use store::{CacheEntry, CacheStore, SchemaVersion};
