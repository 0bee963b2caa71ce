//! Error types for nereid-cache operations.

use std::io;
use thiserror::Error;

/// The error type for nereid-cache operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred while reading or writing a cache slot.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encoding or decoding error.
    #[error("binary codec error: {0}")]
    Binary(#[from] Box<bincode::ErrorKind>),

    /// A cache slot exists but does not hold a usable entry.
    #[error("Invalid cache entry: {0}")]
    InvalidFormat(String),
}

/// A specialized Result type for nereid-cache operations.
pub type Result<T> = std::result::Result<T, Error>;
