//! Stable symbol identifiers.
//!
//! A [`StableId`] is the 64-bit xxh3 hash of a symbol's unique signature, so
//! the same symbol seen from two translation units gets the same id without
//! any coordination. Builtin types skip hashing and use fixed ids in
//! `1..StableId::FIRST_HASHED`; a hash that lands in that range is shifted out
//! of it.

use xxhash_rust::xxh3::xxh3_64;

use crate::types::StableId;

/// Builtin type names and their reserved ids.
const BUILTINS: &[(&str, u64)] = &[
    ("void", 1),
    ("bool", 2),
    ("char", 3),
    ("signed char", 4),
    ("unsigned char", 5),
    ("wchar_t", 6),
    ("char8_t", 7),
    ("char16_t", 8),
    ("char32_t", 9),
    ("short", 10),
    ("unsigned short", 11),
    ("int", 12),
    ("unsigned int", 13),
    ("long", 14),
    ("unsigned long", 15),
    ("long long", 16),
    ("unsigned long long", 17),
    ("__int128", 18),
    ("unsigned __int128", 19),
    ("float", 20),
    ("double", 21),
    ("long double", 22),
    ("__float128", 23),
    ("nullptr_t", 24),
];

/// Hash a signature into a [`StableId`].
///
/// An empty signature maps to [`StableId::UNKNOWN`].
#[must_use]
pub fn stable_id(signature: &str) -> StableId {
    if signature.is_empty() {
        return StableId::UNKNOWN;
    }
    let hash = xxh3_64(signature.as_bytes());
    if hash < StableId::FIRST_HASHED {
        StableId(hash + StableId::FIRST_HASHED)
    } else {
        StableId(hash)
    }
}

/// Reserved id for a builtin type name, if it is one.
#[must_use]
pub fn builtin_id(name: &str) -> Option<StableId> {
    BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, id)| StableId(*id))
}

/// Name of the builtin type with the given reserved id.
#[must_use]
pub fn builtin_name(id: StableId) -> Option<&'static str> {
    BUILTINS
        .iter()
        .find(|(_, builtin)| *builtin == id.0)
        .map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn same_signature_same_id() {
        assert_eq!(stable_id("c:@F@F#"), stable_id("c:@F@F#"));
        assert_ne!(stable_id("c:@F@F#"), stable_id("c:@F@G#"));
    }

    #[test]
    fn empty_signature_is_unknown() {
        assert_eq!(stable_id(""), StableId::UNKNOWN);
    }

    #[test]
    fn builtins_use_reserved_range() {
        let int = builtin_id("int").unwrap();
        assert!(int.is_builtin());
        assert_eq!(builtin_name(int), Some("int"));
        assert_eq!(builtin_id("MyClass"), None);
    }

    #[test]
    fn builtin_ids_are_distinct() {
        let mut ids: Vec<u64> = BUILTINS.iter().map(|(_, id)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), BUILTINS.len());
        assert!(ids.iter().all(|id| *id > 0 && *id < StableId::FIRST_HASHED));
    }

    proptest! {
        #[test]
        fn hashed_ids_never_enter_reserved_range(sig in ".{1,64}") {
            let id = stable_id(&sig);
            prop_assert!(id.as_u64() >= StableId::FIRST_HASHED);
        }
    }
}
