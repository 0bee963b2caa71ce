//! On-disk encodings for cache envelopes.

use crate::Result;
use bincode::Options;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;

/// Hard upper bound for a binary envelope we will attempt to decode.
///
/// A corrupted length prefix must degrade to a cache miss, not a huge allocation.
pub const BINARY_PAYLOAD_LIMIT_BYTES: u64 = 256 * 1024 * 1024;

/// Serialization format used for snapshot files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheFormat {
    /// Human-readable JSON.
    Json,
    /// Compact little-endian fixed-int bincode.
    #[default]
    Binary,
}

impl CacheFormat {
    /// File extension appended to the slot name for snapshot files.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Binary => "bin",
        }
    }

    pub(crate) fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            Self::Json => Ok(serde_json::to_vec(value)?),
            Self::Binary => Ok(binary_options().serialize(value)?),
        }
    }

    /// Decodes a complete value. Trailing bytes are an error.
    pub(crate) fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T> {
        match self {
            Self::Json => Ok(serde_json::from_slice(bytes)?),
            Self::Binary => Ok(binary_options()
                .with_limit(BINARY_PAYLOAD_LIMIT_BYTES)
                .deserialize(bytes)?),
        }
    }

    /// Decodes only the leading fields of a value.
    ///
    /// Bincode is not self-describing, so `T` must be a field-order prefix of
    /// the encoded struct. JSON ignores the remaining keys.
    pub(crate) fn decode_prefix<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T> {
        match self {
            Self::Json => Ok(serde_json::from_slice(bytes)?),
            Self::Binary => Ok(binary_options()
                .with_limit(BINARY_PAYLOAD_LIMIT_BYTES)
                .allow_trailing_bytes()
                .deserialize(bytes)?),
        }
    }
}

impl fmt::Display for CacheFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

impl FromStr for CacheFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "binary" | "bin" => Ok(Self::Binary),
            other => Err(crate::Error::InvalidFormat(format!(
                "unknown cache format '{other}' (expected 'json' or 'binary')"
            ))),
        }
    }
}

fn binary_options() -> impl Options + Copy {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Full {
        a: u32,
        b: String,
        c: Vec<u64>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Prefix {
        a: u32,
        b: String,
    }

    #[rstest]
    #[case(CacheFormat::Json)]
    #[case(CacheFormat::Binary)]
    fn prefix_decoding_reads_leading_fields(#[case] format: CacheFormat) {
        let full = Full {
            a: 7,
            b: "x".to_string(),
            c: vec![1, 2, 3],
        };
        let bytes = format.encode(&full).unwrap();

        let prefix: Prefix = format.decode_prefix(&bytes).unwrap();
        assert_eq!(
            prefix,
            Prefix {
                a: 7,
                b: "x".to_string()
            }
        );
    }

    #[test]
    fn binary_decode_rejects_trailing_bytes() {
        let mut bytes = CacheFormat::Binary.encode(&7u32).unwrap();
        bytes.push(0);
        assert!(CacheFormat::Binary.decode::<u32>(&bytes).is_err());
    }

    #[rstest]
    #[case("json", CacheFormat::Json)]
    #[case("BINARY", CacheFormat::Binary)]
    #[case("bin", CacheFormat::Binary)]
    fn parses_format_names(#[case] input: &str, #[case] expected: CacheFormat) {
        assert_eq!(input.parse::<CacheFormat>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_format_name() {
        assert!("yaml".parse::<CacheFormat>().is_err());
    }
}
