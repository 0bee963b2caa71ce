//! Cache slot naming.
//!
//! A slot name is the percent-encoding of the source path's raw bytes. Every
//! byte that is significant to a filesystem (separators, drive colons, dots)
//! or to the encoding itself (`%`, `~`) is escaped, so the mapping from
//! distinct paths to distinct names is injective and a slot name never
//! contains an extension of its own.
//!
//! Names longer than [`MAX_SLOT_NAME_LEN`] keep a readable prefix and end in
//! `~` followed by a 128-bit hash of the full encoding. Because a literal `~`
//! is always escaped, hashed names cannot collide with unhashed ones.

use percent_encoding::{AsciiSet, CONTROLS, percent_encode};
use std::path::Path;
use xxhash_rust::xxh3::xxh3_128;

/// Longest slot name written verbatim. Leaves headroom under the common
/// 255-byte file name limit for the format extension and temp suffixes.
pub const MAX_SLOT_NAME_LEN: usize = 180;

const HASHED_PREFIX_LEN: usize = 120;

const SLOT_ESCAPES: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'\\')
    .add(b':')
    .add(b'.')
    .add(b'%')
    .add(b'~')
    .add(b' ')
    .add(b'*')
    .add(b'?')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'|');

/// Returns the filesystem-safe slot name for a source path.
#[must_use]
pub fn slot_name(path: &Path) -> String {
    let encoded = percent_encode(path.as_os_str().as_encoded_bytes(), SLOT_ESCAPES).to_string();
    if encoded.len() <= MAX_SLOT_NAME_LEN {
        return encoded;
    }

    // The encoding is pure ASCII, so any byte offset is a char boundary.
    let digest = xxh3_128(encoded.as_bytes());
    format!("{}~{digest:032x}", &encoded[..HASHED_PREFIX_LEN])
}
