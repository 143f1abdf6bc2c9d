//! Interned keywords: `:foo`, `:ns/foo`.
//!
//! Keyword interning is a process-wide invariant (§8 invariant 3: two
//! keywords produced anywhere in the process with the same `(ns, name)`
//! must be reference-equal) rather than something that varies per
//! `RuntimeContext`, so the intern table lives here as a lazily
//! initialized global, guarded by a reader-writer lock with
//! double-checked insertion (§5 "Locks and shared resources").

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
struct KeywordKey {
    ns: Option<Arc<str>>,
    name: Arc<str>,
}

#[derive(Debug)]
struct KeywordData {
    ns: Option<Arc<str>>,
    name: Arc<str>,
}

/// A keyword value. Cloning is a cheap `Arc` bump; equality is reference
/// equality by construction since `intern` never creates a duplicate.
#[derive(Clone, Debug)]
pub struct Keyword(Arc<KeywordData>);

impl Keyword {
    pub fn ns(&self) -> Option<&str> {
        self.0.ns.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    fn table() -> &'static RwLock<HashMap<KeywordKey, Keyword>> {
        static TABLE: OnceLock<RwLock<HashMap<KeywordKey, Keyword>>> = OnceLock::new();
        TABLE.get_or_init(|| RwLock::new(HashMap::new()))
    }

    /// Intern `(ns, name)`, returning the process-wide canonical keyword.
    pub fn intern(ns: Option<&str>, name: &str) -> Keyword {
        let key = KeywordKey { ns: ns.map(Arc::from), name: Arc::from(name) };
        if let Some(existing) = Self::table().read().expect("keyword table poisoned").get(&key) {
            return existing.clone();
        }
        let mut table = Self::table().write().expect("keyword table poisoned");
        // Double-checked: another thread may have interned it while we waited for the write lock.
        if let Some(existing) = table.get(&key) {
            return existing.clone();
        }
        let kw = Keyword(Arc::new(KeywordData { ns: key.ns.clone(), name: key.name.clone() }));
        table.insert(key, kw.clone());
        kw
    }

    pub fn is(&self, ns: Option<&str>, name: &str) -> bool {
        self.ns() == ns && self.name() == name
    }
}

impl PartialEq for Keyword {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Keyword {}

impl std::hash::Hash for Keyword {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ns() {
            Some(ns) => write!(f, ":{}/{}", ns, self.name()),
            None => write!(f, ":{}", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_yields_reference_equal_keywords() {
        let a = Keyword::intern(Some("user"), "foo");
        let b = Keyword::intern(Some("user"), "foo");
        assert!(Arc::ptr_eq(&a.0, &b.0));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_namespaces_are_distinct_keywords() {
        let a = Keyword::intern(Some("a"), "x");
        let b = Keyword::intern(Some("b"), "x");
        assert_ne!(a, b);
    }

    #[test]
    fn unqualified_keyword_displays_without_ns() {
        let k = Keyword::intern(None, "ok");
        assert_eq!(k.to_string(), ":ok");
    }
}
