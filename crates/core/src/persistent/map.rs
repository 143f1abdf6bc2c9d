//! Persistent hash map: a hash array mapped trie (HAMT), 32-way branching,
//! giving O(log32 n) `assoc`/`dissoc`/lookup with full structural sharing.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

const BITS: u32 = 5;
const WIDTH: u32 = 1 << BITS; // 32
const MASK: u64 = (WIDTH - 1) as u64;

fn hash_of<K: Hash>(key: &K) -> u64 {
    struct Fnv(u64);
    impl Hasher for Fnv {
        fn finish(&self) -> u64 {
            self.0
        }
        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 ^= b as u64;
                self.0 = self.0.wrapping_mul(0x100000001b3);
            }
        }
    }
    let mut h = Fnv(0xcbf29ce484222325);
    key.hash(&mut h);
    h.finish()
}

enum Node<K, V> {
    /// Bitmap-indexed interior node: `bitmap` records which of the 32 slots
    /// are populated; `children` holds only the populated ones, compacted.
    Bitmap { bitmap: u32, children: Vec<Arc<Node<K, V>>> },
    /// A leaf holding all entries that hash-collided down to this depth.
    Collision { hash: u64, entries: Vec<(K, V)> },
    Entry { hash: u64, key: K, value: V },
}

fn bit_pos(hash: u64, shift: u32) -> u32 {
    1 << ((hash >> shift) & MASK)
}

fn child_index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

impl<K: Clone + PartialEq, V: Clone> Node<K, V> {
    fn get(&self, hash: u64, key: &K, shift: u32) -> Option<&V> {
        match self {
            Node::Entry { hash: h, key: k, value } => {
                if *h == hash && k == key {
                    Some(value)
                } else {
                    None
                }
            }
            Node::Collision { hash: h, entries } => {
                if *h != hash {
                    return None;
                }
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            Node::Bitmap { bitmap, children } => {
                let bit = bit_pos(hash, shift);
                if bitmap & bit == 0 {
                    return None;
                }
                let idx = child_index(*bitmap, bit);
                children[idx].get(hash, key, shift + BITS)
            }
        }
    }

    fn insert(self: &Arc<Self>, hash: u64, key: K, value: V, shift: u32) -> (Arc<Self>, bool) {
        match self.as_ref() {
            Node::Entry { hash: h, key: k, value: v } => {
                if *h == hash {
                    if *k == key {
                        return (Arc::new(Node::Entry { hash, key, value }), false);
                    }
                    return (
                        Arc::new(Node::Collision {
                            hash,
                            entries: vec![(k.clone(), v.clone()), (key, value)],
                        }),
                        true,
                    );
                }
                let existing =
                    Arc::new(Node::Entry { hash: *h, key: k.clone(), value: v.clone() });
                let merged = merge_two(existing, *h, Arc::new(Node::Entry { hash, key, value }), hash, shift);
                (merged, true)
            }
            Node::Collision { hash: h, entries } => {
                if *h != hash {
                    let existing = Arc::new(Node::Collision { hash: *h, entries: entries.clone() });
                    let merged = merge_two(
                        existing,
                        *h,
                        Arc::new(Node::Entry { hash, key, value }),
                        hash,
                        shift,
                    );
                    return (merged, true);
                }
                let mut new_entries = entries.clone();
                let existed = new_entries.iter().any(|(k, _)| *k == key);
                if let Some(slot) = new_entries.iter_mut().find(|(k, _)| *k == key) {
                    slot.1 = value;
                } else {
                    new_entries.push((key, value));
                }
                (Arc::new(Node::Collision { hash, entries: new_entries }), !existed)
            }
            Node::Bitmap { bitmap, children } => {
                let bit = bit_pos(hash, shift);
                let idx = child_index(*bitmap, bit);
                if bitmap & bit == 0 {
                    let mut new_children = children.clone();
                    new_children.insert(idx, Arc::new(Node::Entry { hash, key, value }));
                    (Arc::new(Node::Bitmap { bitmap: bitmap | bit, children: new_children }), true)
                } else {
                    let (new_child, added) = children[idx].insert(hash, key, value, shift + BITS);
                    let mut new_children = children.clone();
                    new_children[idx] = new_child;
                    (Arc::new(Node::Bitmap { bitmap: *bitmap, children: new_children }), added)
                }
            }
        }
    }

    fn remove(self: &Arc<Self>, hash: u64, key: &K, shift: u32) -> Option<Arc<Self>> {
        match self.as_ref() {
            Node::Entry { hash: h, key: k, .. } => {
                if *h == hash && k == key {
                    None
                } else {
                    Some(self.clone())
                }
            }
            Node::Collision { hash: h, entries } => {
                if *h != hash {
                    return Some(self.clone());
                }
                let new_entries: Vec<_> = entries.iter().filter(|(k, _)| k != key).cloned().collect();
                match new_entries.len() {
                    0 => None,
                    1 => Some(Arc::new(Node::Entry {
                        hash,
                        key: new_entries[0].0.clone(),
                        value: new_entries[0].1.clone(),
                    })),
                    _ => Some(Arc::new(Node::Collision { hash, entries: new_entries })),
                }
            }
            Node::Bitmap { bitmap, children } => {
                let bit = bit_pos(hash, shift);
                if bitmap & bit == 0 {
                    return Some(self.clone());
                }
                let idx = child_index(*bitmap, bit);
                match children[idx].remove(hash, key, shift + BITS) {
                    None => {
                        if children.len() == 1 {
                            None
                        } else {
                            let mut new_children = children.clone();
                            new_children.remove(idx);
                            Some(Arc::new(Node::Bitmap { bitmap: bitmap & !bit, children: new_children }))
                        }
                    }
                    Some(new_child) => {
                        let mut new_children = children.clone();
                        new_children[idx] = new_child;
                        Some(Arc::new(Node::Bitmap { bitmap: *bitmap, children: new_children }))
                    }
                }
            }
        }
    }

    fn for_each<'a>(&'a self, out: &mut Vec<(&'a K, &'a V)>) {
        match self {
            Node::Entry { key, value, .. } => out.push((key, value)),
            Node::Collision { entries, .. } => out.extend(entries.iter().map(|(k, v)| (k, v))),
            Node::Bitmap { children, .. } => children.iter().for_each(|c| c.for_each(out)),
        }
    }
}

fn merge_two<K: Clone + PartialEq, V: Clone>(
    a: Arc<Node<K, V>>,
    hash_a: u64,
    b: Arc<Node<K, V>>,
    hash_b: u64,
    shift: u32,
) -> Arc<Node<K, V>> {
    if shift >= 64 {
        // Degenerate (exhausted hash bits): treat as collision bucket.
        let mut out = Vec::new();
        a.for_each(&mut out);
        b.for_each(&mut out);
        let entries = out.into_iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        return Arc::new(Node::Collision { hash: hash_a, entries });
    }
    let bit_a = bit_pos(hash_a, shift);
    let bit_b = bit_pos(hash_b, shift);
    if bit_a == bit_b {
        let child = merge_two(a, hash_a, b, hash_b, shift + BITS);
        Arc::new(Node::Bitmap { bitmap: bit_a, children: vec![child] })
    } else if bit_a < bit_b {
        Arc::new(Node::Bitmap { bitmap: bit_a | bit_b, children: vec![a, b] })
    } else {
        Arc::new(Node::Bitmap { bitmap: bit_a | bit_b, children: vec![b, a] })
    }
}

/// A persistent, structure-sharing hash map.
pub struct PersistentMap<K, V> {
    root: Option<Arc<Node<K, V>>>,
    len: usize,
}

impl<K, V> Clone for PersistentMap<K, V> {
    fn clone(&self) -> Self {
        PersistentMap { root: self.root.clone(), len: self.len }
    }
}

impl<K: Clone + PartialEq + Hash, V: Clone> Default for PersistentMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + PartialEq + Hash, V: Clone> PersistentMap<K, V> {
    pub fn new() -> Self {
        PersistentMap { root: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.root.as_ref().and_then(|r| r.get(hash_of(key), key, 0))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Associate `key` with `value`, returning a new map.
    pub fn assoc(&self, key: K, value: V) -> Self {
        let hash = hash_of(&key);
        match &self.root {
            None => PersistentMap {
                root: Some(Arc::new(Node::Entry { hash, key, value })),
                len: 1,
            },
            Some(root) => {
                let (new_root, added) = root.insert(hash, key, value, 0);
                PersistentMap { root: Some(new_root), len: self.len + added as usize }
            }
        }
    }

    /// Remove `key`, returning a new map (identical to `self` if absent).
    pub fn dissoc(&self, key: &K) -> Self {
        let Some(root) = &self.root else {
            return self.clone();
        };
        let hash = hash_of(key);
        match root.remove(hash, key, 0) {
            None => PersistentMap { root: None, len: 0 },
            Some(new_root) => {
                if self.contains_key(key) {
                    PersistentMap { root: Some(new_root), len: self.len - 1 }
                } else {
                    self.clone()
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        let mut out = Vec::with_capacity(self.len);
        if let Some(root) = &self.root {
            root.for_each(&mut out);
        }
        out.into_iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut m = Self::new();
        for (k, v) in pairs {
            m = m.assoc(k, v);
        }
        m
    }
}

impl<K: Clone + PartialEq + Hash, V: Clone + PartialEq> PartialEq for PersistentMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assoc_and_get() {
        let m = PersistentMap::new().assoc("a", 1).assoc("b", 2);
        assert_eq!(m.get(&"a"), Some(&1));
        assert_eq!(m.get(&"b"), Some(&2));
        assert_eq!(m.get(&"c"), None);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn assoc_does_not_mutate_original() {
        let m1 = PersistentMap::new().assoc("a", 1);
        let m2 = m1.assoc("a", 2);
        assert_eq!(m1.get(&"a"), Some(&1));
        assert_eq!(m2.get(&"a"), Some(&2));
    }

    #[test]
    fn dissoc_removes_key() {
        let m = PersistentMap::new().assoc("a", 1).assoc("b", 2);
        let m2 = m.dissoc(&"a");
        assert_eq!(m2.get(&"a"), None);
        assert_eq!(m2.len(), 1);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn many_keys_round_trip() {
        let mut m = PersistentMap::new();
        for i in 0..500 {
            m = m.assoc(i, i * 2);
        }
        for i in 0..500 {
            assert_eq!(m.get(&i), Some(&(i * 2)));
        }
        assert_eq!(m.len(), 500);
    }

    #[test]
    fn equality_is_structural_not_pointer() {
        let a = PersistentMap::new().assoc(1, "x").assoc(2, "y");
        let b = PersistentMap::new().assoc(2, "y").assoc(1, "x");
        assert_eq!(a, b);
    }
}
