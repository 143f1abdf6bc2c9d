//! Immutable, hash-memoized strings.
//!
//! Mirrors the teacher's `seqstring::SeqString` (an owned, hash-memoized string
//! used throughout the value model) but drops the arena-vs-global allocation
//! split since this crate's persistent collections are reference-counted
//! rather than arena-owned by default.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// An immutable byte sequence with a precomputed hash.
#[derive(Clone)]
pub struct RString {
    text: Arc<str>,
    hash: u64,
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut h = OFFSET;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(PRIME);
    }
    h
}

fn empty_singleton() -> &'static RString {
    static EMPTY: OnceLock<RString> = OnceLock::new();
    EMPTY.get_or_init(|| RString {
        text: Arc::from(""),
        hash: fnv1a(b""),
    })
}

impl RString {
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        let text: Arc<str> = s.into();
        if text.is_empty() {
            return empty_singleton().clone();
        }
        let hash = fnv1a(text.as_bytes());
        RString { text, hash }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn hash_u64(&self) -> u64 {
        self.hash
    }

    pub fn concat(&self, other: &RString) -> RString {
        let mut s = String::with_capacity(self.text.len() + other.text.len());
        s.push_str(&self.text);
        s.push_str(&other.text);
        RString::new(s)
    }
}

impl PartialEq for RString {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.text == other.text
    }
}
impl Eq for RString {}

impl Hash for RString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for RString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.text)
    }
}

impl fmt::Display for RString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl From<&str> for RString {
    fn from(s: &str) -> Self {
        RString::new(s)
    }
}

impl From<String> for RString {
    fn from(s: String) -> Self {
        RString::new(s)
    }
}

impl PartialOrd for RString {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for RString {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.text.cmp(&other.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_strings_share_hash() {
        let a = RString::new("");
        let b = RString::new(String::new());
        assert_eq!(a.hash_u64(), b.hash_u64());
        assert_eq!(a, b);
    }

    #[test]
    fn equal_strings_have_equal_hashes() {
        let a = RString::new("hello");
        let b = RString::new("hello".to_string());
        assert_eq!(a, b);
        assert_eq!(a.hash_u64(), b.hash_u64());
    }

    #[test]
    fn concat_preserves_content() {
        let a = RString::new("foo");
        let b = RString::new("bar");
        assert_eq!(a.concat(&b).as_str(), "foobar");
    }
}
