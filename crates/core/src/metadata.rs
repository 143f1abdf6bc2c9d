//! Metadata maps: `{:file ..., :line ..., :column ..., :tag ..., :doc ...}`
//! attached to symbols, vars, and collections (§3, §4.5 source-location
//! tracking). Backed directly by [`crate::persistent::PersistentMap`]
//! rather than a bespoke struct, since metadata is itself just an ordinary
//! keyword-keyed map the language can `assoc` into at the call site.

use crate::keyword::Keyword;
use crate::object::Object;
use crate::persistent::PersistentMap;

pub type Metadata = PersistentMap<Keyword, Object>;

pub trait MetadataExt {
    fn assoc_str(self, key: &str, value: impl Into<Object>) -> Metadata;
    fn get_str(&self, key: &str) -> Option<&Object>;
    fn merge(&self, other: &Metadata) -> Metadata;
}

impl MetadataExt for Metadata {
    fn assoc_str(self, key: &str, value: impl Into<Object>) -> Metadata {
        self.assoc(Keyword::intern(None, key), value.into())
    }

    fn get_str(&self, key: &str) -> Option<&Object> {
        self.get(&Keyword::intern(None, key))
    }

    /// Right-biased merge: `other`'s entries win on key collision, matching
    /// `(merge existing-meta new-meta)` ordering used when reader-accumulated
    /// `^` prefixes are folded onto a form.
    fn merge(&self, other: &Metadata) -> Metadata {
        let mut out = self.clone();
        for (k, v) in other.iter() {
            out = out.assoc(k.clone(), v.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assoc_str_interns_keyword_key() {
        let m = Metadata::new().assoc_str("line", 7i64);
        assert_eq!(m.get_str("line"), Some(&Object::Integer(7)));
    }

    #[test]
    fn merge_is_right_biased() {
        let a = Metadata::new().assoc_str("line", 1i64);
        let b = Metadata::new().assoc_str("line", 2i64).assoc_str("file", "x.clj");
        let merged = a.merge(&b);
        assert_eq!(merged.get_str("line"), Some(&Object::Integer(2)));
        assert_eq!(merged.get_str("file"), Some(&Object::Str(crate::string::RString::new("x.clj"))));
    }
}
