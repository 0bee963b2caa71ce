//! Domain types shared by every stage of the indexer.
//!
//! - **Identity**: `StableId`, `Category`, `FileId`
//! - **Locations**: `Span`, `Use`, `Role`
//! - **Definition data**: `DefInfo`, `StorageClass`, `RelationKind`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

// ============================================================================
// Strongly-typed ID wrappers
// ============================================================================

/// Globally stable symbol identifier.
///
/// Derived from a symbol's unique signature (see [`crate::stable_id`]).
/// Values below [`StableId::FIRST_HASHED`] are reserved for builtin types and
/// the [`StableId::UNKNOWN`] sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(pub u64);

impl StableId {
    /// Sentinel for entries whose signature could not be hashed.
    pub const UNKNOWN: Self = Self(0);

    /// Smallest value a hashed signature can produce.
    pub const FIRST_HASHED: u64 = 256;

    /// Extract the raw u64 value.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether this id lies in the reserved builtin range.
    #[must_use]
    pub fn is_builtin(self) -> bool {
        self.0 != 0 && self.0 < Self::FIRST_HASHED
    }

    /// Whether this is the unknown sentinel.
    #[must_use]
    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }
}

impl From<u64> for StableId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A strongly-typed file ID, interned by the symbol database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u32);

impl FileId {
    /// Extract the raw u32 value.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for FileId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// The three kinds of symbol the database stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Classes, structs, enums, typedefs, builtin types.
    Type,
    /// Functions and methods.
    Func,
    /// Variables, fields, parameters, enumerators.
    Var,
}

impl Category {
    /// All categories in storage order.
    pub const ALL: [Self; 3] = [Self::Type, Self::Func, Self::Var];

    /// Lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Func => "func",
            Self::Var => "var",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage class of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    /// No explicit storage class.
    #[default]
    None,
    /// `extern`
    Extern,
    /// `static`
    Static,
    /// `__private_extern__`
    PrivateExtern,
    /// `auto`
    Auto,
    /// `register`
    Register,
}

/// Relationship lists carried by a definition.
///
/// Every list holds [`StableId`]s; the category of the target is resolved
/// through the database rather than stored with the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Base classes of a type, or overridden methods of a function.
    Bases,
    /// Reverse of `Bases`.
    Derived,
    /// Functions called from a function body.
    Callees,
    /// Reverse of `Callees`.
    Callers,
    /// Nested types, methods and fields of a type.
    Members,
    /// Variables whose declared type is this type.
    Instances,
}

// ============================================================================
// Locations
// ============================================================================

/// A source range within one file.
///
/// Lines and columns are 1-indexed. The end column is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Starting line
    pub start_line: u32,
    /// Starting column
    pub start_column: u32,
    /// Ending line (inclusive)
    pub end_line: u32,
    /// Ending column (exclusive)
    pub end_column: u32,
}

impl Span {
    /// Create a new span with validation.
    ///
    /// Returns `None` if the end position is before the start position.
    #[must_use]
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Option<Self> {
        if end_line < start_line || (end_line == start_line && end_column < start_column) {
            return None;
        }
        Some(Self {
            start_line,
            start_column,
            end_line,
            end_column,
        })
    }

    /// A span on a single line.
    #[must_use]
    pub fn line(line: u32, start_column: u32, end_column: u32) -> Self {
        Self {
            start_line: line,
            start_column,
            end_line: line,
            end_column: end_column.max(start_column),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

/// How a symbol is used at a location. A bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(pub u16);

impl Role {
    /// No role bits set.
    pub const NONE: Self = Self(0);
    /// The location declares the symbol.
    pub const DECLARATION: Self = Self(1 << 0);
    /// The location defines the symbol.
    pub const DEFINITION: Self = Self(1 << 1);
    /// Plain reference.
    pub const REFERENCE: Self = Self(1 << 2);
    /// Value is read.
    pub const READ: Self = Self(1 << 3);
    /// Value is written.
    pub const WRITE: Self = Self(1 << 4);
    /// Function call.
    pub const CALL: Self = Self(1 << 5);
    /// Dynamic (virtual) dispatch.
    pub const DYNAMIC: Self = Self(1 << 6);
    /// Address taken.
    pub const ADDRESS: Self = Self(1 << 7);
    /// Compiler-inserted (implicit conversion, implicit constructor call).
    pub const IMPLICIT: Self = Self(1 << 8);

    const NAMES: [(Self, &'static str); 9] = [
        (Self::DECLARATION, "declaration"),
        (Self::DEFINITION, "definition"),
        (Self::REFERENCE, "reference"),
        (Self::READ, "read"),
        (Self::WRITE, "write"),
        (Self::CALL, "call"),
        (Self::DYNAMIC, "dynamic"),
        (Self::ADDRESS, "address"),
        (Self::IMPLICIT, "implicit"),
    ];

    /// Whether every bit of `other` is set in `self`.
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any bit of `other` is set in `self`.
    #[must_use]
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Parse a single role name as printed by `Display`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(role, _)| *role)
    }
}

impl BitOr for Role {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Role {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (role, name) in Self::NAMES {
            if self.contains(role) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// One use of a symbol: where, and in which roles.
///
/// The file is implied by whoever holds the use (a snapshot, or a per-file
/// contribution in the database).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Use {
    /// Location of the use
    pub span: Span,
    /// Role bitmask
    pub role: Role,
}

impl Use {
    /// Create a use.
    #[must_use]
    pub fn new(span: Span, role: Role) -> Self {
        Self { span, role }
    }
}

// ============================================================================
// Definition data
// ============================================================================

/// Definition-bearing fields of a symbol.
///
/// A file that merely declares or references a symbol carries `DefInfo`
/// without `spell`; only the defining file sets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DefInfo {
    /// Fully qualified, human-readable name (e.g. `ns::Foo::bar(int)`)
    pub detailed_name: String,
    /// Byte offset of the short name within `detailed_name`
    pub short_name_offset: u16,
    /// Byte length of the short name
    pub short_name_len: u16,
    /// Location of the defining name token
    pub spell: Option<Span>,
    /// Full extent of the definition
    pub extent: Option<Span>,
    /// Storage class
    pub storage: StorageClass,
    /// Enclosing type, for members
    pub declaring_type: Option<StableId>,
    /// Declared type, for variables
    pub value_type: Option<StableId>,
}

impl DefInfo {
    /// Whether this info carries a definition location.
    #[must_use]
    pub fn is_definition(&self) -> bool {
        self.spell.is_some()
    }

    /// The short (unqualified) name, falling back to the detailed name if
    /// the recorded span is out of bounds.
    #[must_use]
    pub fn short_name(&self) -> &str {
        let start = usize::from(self.short_name_offset);
        let end = start + usize::from(self.short_name_len);
        self.detailed_name
            .get(start..end)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.detailed_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_new_rejects_inverted_ranges() {
        assert!(Span::new(3, 1, 2, 1).is_none());
        assert!(Span::new(3, 5, 3, 4).is_none());
        assert!(Span::new(3, 5, 3, 5).is_some());
    }

    #[test]
    fn role_bits_combine_and_display() {
        let role = Role::REFERENCE | Role::CALL;
        assert!(role.contains(Role::CALL));
        assert!(!role.contains(Role::DEFINITION));
        assert!(role.intersects(Role::CALL | Role::WRITE));
        assert_eq!(role.to_string(), "reference|call");
        assert_eq!(Role::NONE.to_string(), "none");
    }

    #[test]
    fn role_names_parse_case_insensitively() {
        assert_eq!(Role::from_name("Call"), Some(Role::CALL));
        assert_eq!(Role::from_name("bogus"), None);
    }

    #[test]
    fn short_name_slices_detailed_name() {
        let info = DefInfo {
            detailed_name: "void ns::foo(int)".to_string(),
            short_name_offset: 9,
            short_name_len: 3,
            ..DefInfo::default()
        };
        assert_eq!(info.short_name(), "foo");
    }

    #[test]
    fn short_name_falls_back_when_out_of_bounds() {
        let info = DefInfo {
            detailed_name: "bar".to_string(),
            short_name_offset: 10,
            short_name_len: 3,
            ..DefInfo::default()
        };
        assert_eq!(info.short_name(), "bar");
    }

    #[test]
    fn reserved_range_is_not_hashed() {
        assert!(StableId(5).is_builtin());
        assert!(!StableId::UNKNOWN.is_builtin());
        assert!(StableId::UNKNOWN.is_unknown());
        assert!(!StableId(StableId::FIRST_HASHED).is_builtin());
    }
}
