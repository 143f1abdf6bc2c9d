//! Symbols: `foo`, `ns/foo`.
//!
//! Unlike keywords (see [`crate::keyword::Keyword`]), symbols are **not**
//! process-interned: the reader must be able to attach distinct
//! source-location metadata (§3 "Metadata is carried by symbols... reading
//! from source attaches `{file, start, end}`") to two textually-identical
//! symbols read at different source positions, which a single canonical
//! instance per name would make impossible. Symbol *equality* is therefore
//! value equality over `(ns, name)`; `intern(ns, sym) -> var` (§4.1) is what
//! gives reference-stable identity, realized on the `Var` it returns, not on
//! the `Symbol` argument. See DESIGN.md for this resolution of the
//! `:symbol interning:` sentence in §4.1.

use crate::metadata::{Metadata, MetadataExt};
use crate::string::RString;
use std::fmt;
use std::sync::{Arc, RwLock};

struct SymbolData {
    ns: Option<RString>,
    name: RString,
    meta: RwLock<Option<Metadata>>,
}

#[derive(Clone)]
pub struct Symbol(Arc<SymbolData>);

impl Symbol {
    pub fn new(ns: Option<&str>, name: &str) -> Self {
        Symbol(Arc::new(SymbolData {
            ns: ns.map(RString::new),
            name: RString::new(name),
            meta: RwLock::new(None),
        }))
    }

    pub fn unqualified(name: &str) -> Self {
        Self::new(None, name)
    }

    pub fn ns(&self) -> Option<&str> {
        self.0.ns.as_ref().map(|s| s.as_str())
    }

    pub fn name(&self) -> &str {
        self.0.name.as_str()
    }

    pub fn is_qualified(&self) -> bool {
        self.0.ns.is_some()
    }

    pub fn meta(&self) -> Option<Metadata> {
        self.0.meta.read().expect("symbol metadata lock poisoned").clone()
    }

    pub fn with_meta(&self, meta: Metadata) -> Self {
        let clone = Symbol::new(self.ns(), self.name());
        *clone.0.meta.write().expect("symbol metadata lock poisoned") = Some(meta);
        clone
    }

    /// Merge `meta` on top of any metadata this symbol already carries,
    /// in place. Used by the reader when it accumulates `^` prefixes
    /// left-to-right before attaching them to the following form.
    pub fn merge_meta(&self, meta: Metadata) {
        let mut slot = self.0.meta.write().expect("symbol metadata lock poisoned");
        *slot = Some(match slot.take() {
            Some(existing) => existing.merge(&meta),
            None => meta,
        });
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.0.ns == other.0.ns && self.0.name == other.0.name
    }
}
impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.ns.hash(state);
        self.0.name.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ns() {
            Some(ns) => write!(f, "{}/{}", ns, self.name()),
            None => write!(f, "{}", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_value_not_identity() {
        let a = Symbol::new(Some("user"), "x");
        let b = Symbol::new(Some("user"), "x");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_occurrences_can_carry_distinct_metadata() {
        let a = Symbol::new(None, "x");
        let b = Symbol::new(None, "x");
        a.merge_meta(Metadata::new().assoc_str("line", 1));
        b.merge_meta(Metadata::new().assoc_str("line", 2));
        assert_eq!(a, b);
        assert_ne!(a.meta(), b.meta());
    }
}
