//! Path normalization and modification times.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Modification time in nanoseconds since the Unix epoch.
pub type Timestamp = i64;

/// Normalize a path into its canonical, absolute form.
///
/// Relative paths are resolved against the current directory, then `.` and
/// `..` components and repeated separators are removed lexically. Symlinks are
/// not followed, so the file does not need to exist.
///
/// Idempotent: `normalize(&normalize(p)) == normalize(p)`.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    match std::env::current_dir() {
        Ok(cwd) => normalize_against(&cwd, path),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No current directory; normalizing lexically");
            path_clean::clean(path)
        }
    }
}

/// Normalize `path`, resolving it against `base` if it is relative.
#[must_use]
pub fn normalize_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path_clean::clean(path)
    } else {
        path_clean::clean(base.join(path))
    }
}

/// Modification time of `path`, or `None` if it does not exist or cannot be
/// read. Never fails.
#[must_use]
pub fn last_modified(path: &Path) -> Option<Timestamp> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(to_timestamp(modified))
}

fn to_timestamp(time: SystemTime) -> Timestamp {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_nanos()).map_or(i64::MIN, |n| -n),
    }
}
