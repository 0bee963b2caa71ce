//! Atomic file writes for cache slots.
//!
//! Slots are written with the temp-file-then-rename pattern so a concurrent
//! reader sees either the previous bytes or the new bytes, never a torn write.
//!
//! # Atomicity Guarantee
//!
//! On POSIX systems, file renames within the same filesystem are atomic operations:
//!
//! 1. Data is first written to a uniquely named temporary file next to the target
//! 2. The temporary file is flushed, synced and closed
//! 3. The temporary file is renamed onto the target path
//!
//! If a crash occurs during step 1 or 2, the original file remains intact.
//! The temporary file may be left behind, but data integrity is preserved.

use crate::Result;
use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Atomically replaces the contents of `path` with `bytes`.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns an error if:
/// - The parent directory cannot be created
/// - The temporary file cannot be created or written
/// - The rename fails (e.g., cross-filesystem move)
///
/// On failure the original file (if it exists) is left unchanged and the
/// temporary file is removed on a best-effort basis.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = make_temp_path(path, TEMP_COUNTER.fetch_add(1, Ordering::Relaxed));

    if let Err(e) = write_to_temp_file(&temp_path, bytes) {
        // Best-effort cleanup of temp file
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }

    Ok(())
}

/// Creates a temporary file path for an atomic write.
///
/// The temp path appends `.<pid>-<seq>.tmp` to the file name so that two
/// writers racing on the same slot never share a temporary file.
fn make_temp_path(path: &Path, seq: u64) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(OsString::new, std::ffi::OsStr::to_os_string);
    name.push(format!(".{}-{seq}.tmp", std::process::id()));
    path.with_file_name(name)
}

fn write_to_temp_file(temp_path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_temp_path_with_extension() {
        let temp = make_temp_path(Path::new("/cache/slot.json"), 7);
        let expected = format!("/cache/slot.json.{}-7.tmp", std::process::id());
        assert_eq!(temp, PathBuf::from(expected));
    }

    #[test]
    fn make_temp_path_without_extension() {
        let temp = make_temp_path(Path::new("/cache/slot"), 0);
        let expected = format!("/cache/slot.{}-0.tmp", std::process::id());
        assert_eq!(temp, PathBuf::from(expected));
    }

    #[test]
    fn make_temp_path_is_unique_per_sequence() {
        let path = Path::new("slot.bin");
        assert_ne!(make_temp_path(path, 1), make_temp_path(path, 2));
    }

    #[test]
    fn atomic_write_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/deeper/slot");

        write_atomic(&target, b"hello").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("slot");
        std::fs::write(&target, "old content").unwrap();

        write_atomic(&target, b"new").unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("slot.json");

        write_atomic(&target, b"{}").unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![OsString::from("slot.json")]);
    }

    #[test]
    fn atomic_write_empty_payload() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("empty");

        write_atomic(&target, b"").unwrap();

        assert_eq!(std::fs::metadata(&target).unwrap().len(), 0);
    }
}
