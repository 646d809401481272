//! The [`ClassKey`] identifier.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Identifies the call site (or category of call sites) holding references
/// on a tracked object.
///
/// Keys are fully owned, variable-length strings: two keys are the same
/// class if and only if their text is equal. Cloning is cheap (the text is
/// shared), which matters because every diagnostic event carries a copy.
///
/// Uniqueness is per counter, not global: the same key used on two
/// counters names two unrelated classes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassKey(Arc<str>);

impl ClassKey {
    /// Fixed key width of the C header this crate replaces.
    ///
    /// Only meaningful together with a configured key limit; keys are not
    /// bounded by default.
    pub const LEGACY_MAX_LEN: usize = 20;

    /// Create a key from the full text of `key`.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Create a key from at most `limit` bytes of `key`.
    ///
    /// The cut is moved back to the nearest UTF-8 character boundary, so
    /// the resulting key may be shorter than `limit`. Distinct inputs that
    /// share a prefix of `limit` bytes produce equal keys.
    pub fn truncated(key: &str, limit: usize) -> Self {
        Self::new(Self::prefix(key, limit))
    }

    /// Longest prefix of `key` that is at most `limit` bytes and ends on
    /// a character boundary.
    ///
    /// This is the text [`ClassKey::truncated`] keeps; it lets lookups
    /// apply the same cut without allocating.
    pub fn prefix(key: &str, limit: usize) -> &str {
        if key.len() <= limit {
            return key;
        }
        let mut end = limit;
        while !key.is_char_boundary(end) {
            end -= 1;
        }
        &key[..end]
    }

    /// The key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length of the key in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassKey({:?})", &*self.0)
    }
}

impl Borrow<str> for ClassKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ClassKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClassKey {
    fn from(v: &str) -> Self {
        Self::new(v)
    }
}

impl From<String> for ClassKey {
    fn from(v: String) -> Self {
        Self(Arc::from(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn long_keys_are_kept_whole() {
        let a = ClassKey::new("network-rx-completion-path");
        let b = ClassKey::new("network-rx-completion-queue");
        assert_ne!(a, b);
        assert_eq!(a.len(), 26);
    }

    #[test]
    fn truncated_aliases_shared_prefix() {
        let a = ClassKey::truncated("network-rx-completion-path", ClassKey::LEGACY_MAX_LEN);
        let b = ClassKey::truncated("network-rx-completion-queue", ClassKey::LEGACY_MAX_LEN);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "network-rx-completio");
    }

    #[test]
    fn truncated_short_key_unchanged() {
        let k = ClassKey::truncated("irq", ClassKey::LEGACY_MAX_LEN);
        assert_eq!(k.as_str(), "irq");
    }

    #[test]
    fn truncated_respects_char_boundary() {
        // 'é' is two bytes; a cut at byte 2 would split it.
        let k = ClassKey::truncated("aé", 2);
        assert_eq!(k.as_str(), "a");
    }

    #[test]
    fn borrow_allows_str_lookup() {
        let mut map = HashMap::new();
        map.insert(ClassKey::new("open"), 1);
        assert_eq!(map.get("open"), Some(&1));
    }

    #[test]
    fn display_and_debug() {
        let k = ClassKey::from("fd-table");
        assert_eq!(k.to_string(), "fd-table");
        assert_eq!(format!("{k:?}"), "ClassKey(\"fd-table\")");
    }

    #[test]
    fn empty_key_is_valid() {
        let k = ClassKey::from(String::new());
        assert!(k.is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn truncated_never_exceeds_limit(s in "\\PC{0,40}", limit in 1usize..32) {
                let k = ClassKey::truncated(&s, limit);
                prop_assert!(k.len() <= limit);
                prop_assert!(s.starts_with(k.as_str()));
            }

            #[test]
            fn truncated_is_identity_below_limit(s in "[a-z_]{0,20}") {
                prop_assert_eq!(ClassKey::truncated(&s, 20), ClassKey::new(&s));
            }
        }
    }
}
