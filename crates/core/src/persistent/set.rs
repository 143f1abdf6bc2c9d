//! Persistent hash set: a map to unit, as specified in §4.1.

use super::map::PersistentMap;
use std::hash::Hash;

#[derive(Clone)]
pub struct PersistentSet<T> {
    map: PersistentMap<T, ()>,
}

impl<T: Clone + PartialEq + Hash> Default for PersistentSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq + Hash> PersistentSet<T> {
    pub fn new() -> Self {
        PersistentSet { map: PersistentMap::new() }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.map.contains_key(value)
    }

    pub fn conj(&self, value: T) -> Self {
        PersistentSet { map: self.map.assoc(value, ()) }
    }

    pub fn disj(&self, value: &T) -> Self {
        PersistentSet { map: self.map.dissoc(value) }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.map.keys()
    }

    pub fn from_iter_cloned(items: impl IntoIterator<Item = T>) -> Self {
        let mut s = Self::new();
        for item in items {
            s = s.conj(item);
        }
        s
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for item in other.iter() {
            result = result.conj(item.clone());
        }
        result
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self::from_iter_cloned(self.iter().filter(|x| other.contains(x)).cloned())
    }

    pub fn difference(&self, other: &Self) -> Self {
        Self::from_iter_cloned(self.iter().filter(|x| !other.contains(x)).cloned())
    }
}

impl<T: Clone + PartialEq + Hash> PartialEq for PersistentSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|x| other.contains(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conj_and_disj_do_not_mutate() {
        let s1 = PersistentSet::new().conj(1).conj(2);
        let s2 = s1.conj(3);
        assert!(!s1.contains(&3));
        assert!(s2.contains(&3));
        let s3 = s2.disj(&1);
        assert!(s2.contains(&1));
        assert!(!s3.contains(&1));
    }

    #[test]
    fn set_algebra() {
        let a = PersistentSet::from_iter_cloned([1, 2, 3]);
        let b = PersistentSet::from_iter_cloned([2, 3, 4]);
        assert_eq!(a.union(&b).len(), 4);
        assert_eq!(a.intersection(&b).len(), 2);
        assert_eq!(a.difference(&b).len(), 1);
    }
}
