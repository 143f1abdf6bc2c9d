//! The universal sequence protocol (§4.1 "All containers implement `seq`:
//! a lazy, restartable sequence of their elements... `seq` is the universal
//! iteration protocol; it yields a stream plus an O(1) `rest` that does not
//! re-traverse").
//!
//! Since every persistent collection here is already fully realized in
//! memory (no infinite/lazily-generated sequences are part of this object
//! model), a `Seq` is simply a shared backing slice plus a cursor: `rest`
//! clones the `Arc` and bumps the index, which is O(1) and never
//! re-walks the original collection, without needing a thunk-based lazy
//! cons cell to get there.

use crate::object::Object;
use std::sync::Arc;

#[derive(Clone)]
pub struct Seq {
    items: Arc<[Object]>,
    index: usize,
}

impl Seq {
    pub fn from_vec(items: Vec<Object>) -> Option<Seq> {
        if items.is_empty() {
            None
        } else {
            Some(Seq { items: Arc::from(items), index: 0 })
        }
    }

    pub fn first(&self) -> &Object {
        &self.items[self.index]
    }

    /// O(1): shares the backing slice, only advances the cursor.
    pub fn rest(&self) -> Option<Seq> {
        let next = self.index + 1;
        if next >= self.items.len() {
            None
        } else {
            Some(Seq { items: self.items.clone(), index: next })
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Object> + '_ {
        self.items[self.index..].iter()
    }

    pub fn count(&self) -> usize {
        self.items.len() - self.index
    }
}

impl Object {
    /// Produce this object's `seq`, or `None` for an empty/non-seqable
    /// object (mirrors Clojure's `(seq empty-coll) => nil`).
    pub fn seq(&self) -> Option<Seq> {
        match self {
            Object::Nil => None,
            Object::Vector(v) => Seq::from_vec(v.to_vec()),
            Object::List(l) => Seq::from_vec(l.iter().cloned().collect()),
            Object::Map(m) => Seq::from_vec(
                m.iter()
                    .map(|(k, v)| Object::Vector(crate::persistent::PersistentVector::from_iter_cloned([k.clone(), v.clone()])))
                    .collect(),
            ),
            Object::Set(s) => Seq::from_vec(s.iter().cloned().collect()),
            Object::SortedMap(m) => Seq::from_vec(
                m.iter()
                    .map(|(k, v)| Object::Vector(crate::persistent::PersistentVector::from_iter_cloned([k.clone(), v.clone()])))
                    .collect(),
            ),
            Object::SortedSet(s) => Seq::from_vec(s.iter().cloned().collect()),
            Object::Str(s) => Seq::from_vec(s.as_str().chars().map(Object::Char).collect()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistent::PersistentVector;

    #[test]
    fn rest_does_not_retraverse_and_is_cheap_to_chain() {
        let v = Object::Vector(PersistentVector::from_iter_cloned([Object::Integer(1), Object::Integer(2), Object::Integer(3)]));
        let s = v.seq().unwrap();
        assert_eq!(s.first(), &Object::Integer(1));
        let r1 = s.rest().unwrap();
        assert_eq!(r1.first(), &Object::Integer(2));
        let r2 = r1.rest().unwrap();
        assert_eq!(r2.first(), &Object::Integer(3));
        assert!(r2.rest().is_none());
    }

    #[test]
    fn empty_collection_seqs_to_none() {
        let v: Object = Object::Vector(PersistentVector::<Object>::new());
        assert!(v.seq().is_none());
        assert!(Object::Nil.seq().is_none());
    }

    #[test]
    fn string_seq_yields_chars() {
        let s = Object::Str(crate::string::RString::new("ab"));
        let seq = s.seq().unwrap();
        assert_eq!(seq.iter().cloned().collect::<Vec<_>>(), vec![Object::Char('a'), Object::Char('b')]);
    }
}
