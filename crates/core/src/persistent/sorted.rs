//! Sorted persistent map/set.
//!
//! Modeled as an ordered balanced structure over `Ord` keys: an unbalanced
//! persistent binary search tree with path-copying. This gives genuine
//! structural sharing on every `assoc`/`disj` (unlike cloning a whole
//! `BTreeMap`) while staying far smaller than a full red-black or AVL
//! rebalancing implementation; see DESIGN.md for the tradeoff.

use std::cmp::Ordering;
use std::sync::Arc;

enum Node<K, V> {
    Leaf,
    Branch { key: K, value: V, left: Arc<Node<K, V>>, right: Arc<Node<K, V>> },
}

fn get<'a, K: Ord, V>(node: &'a Arc<Node<K, V>>, key: &K) -> Option<&'a V> {
    match node.as_ref() {
        Node::Leaf => None,
        Node::Branch { key: k, value, left, right } => match key.cmp(k) {
            Ordering::Less => get(left, key),
            Ordering::Greater => get(right, key),
            Ordering::Equal => Some(value),
        },
    }
}

fn insert<K: Ord + Clone, V: Clone>(
    node: &Arc<Node<K, V>>,
    key: K,
    value: V,
) -> (Arc<Node<K, V>>, bool) {
    match node.as_ref() {
        Node::Leaf => (
            Arc::new(Node::Branch { key, value, left: Arc::new(Node::Leaf), right: Arc::new(Node::Leaf) }),
            true,
        ),
        Node::Branch { key: k, value: v, left, right } => match key.cmp(k) {
            Ordering::Less => {
                let (new_left, added) = insert(left, key, value);
                (
                    Arc::new(Node::Branch {
                        key: k.clone(),
                        value: v.clone(),
                        left: new_left,
                        right: right.clone(),
                    }),
                    added,
                )
            }
            Ordering::Greater => {
                let (new_right, added) = insert(right, key, value);
                (
                    Arc::new(Node::Branch {
                        key: k.clone(),
                        value: v.clone(),
                        left: left.clone(),
                        right: new_right,
                    }),
                    added,
                )
            }
            Ordering::Equal => (
                Arc::new(Node::Branch { key, value, left: left.clone(), right: right.clone() }),
                false,
            ),
        },
    }
}

fn min_entry<K: Clone, V: Clone>(node: &Arc<Node<K, V>>) -> Option<(K, V)> {
    match node.as_ref() {
        Node::Leaf => None,
        Node::Branch { key, value, left, .. } => match left.as_ref() {
            Node::Leaf => Some((key.clone(), value.clone())),
            _ => min_entry(left),
        },
    }
}

fn remove<K: Ord + Clone, V: Clone>(node: &Arc<Node<K, V>>, key: &K) -> Option<Arc<Node<K, V>>> {
    match node.as_ref() {
        Node::Leaf => Some(node.clone()),
        Node::Branch { key: k, value, left, right } => match key.cmp(k) {
            Ordering::Less => {
                let new_left = remove(left, key)?;
                Some(Arc::new(Node::Branch {
                    key: k.clone(),
                    value: value.clone(),
                    left: new_left,
                    right: right.clone(),
                }))
            }
            Ordering::Greater => {
                let new_right = remove(right, key)?;
                Some(Arc::new(Node::Branch {
                    key: k.clone(),
                    value: value.clone(),
                    left: left.clone(),
                    right: new_right,
                }))
            }
            Ordering::Equal => match (left.as_ref(), right.as_ref()) {
                (Node::Leaf, Node::Leaf) => Some(Arc::new(Node::Leaf)),
                (Node::Leaf, _) => Some(right.clone()),
                (_, Node::Leaf) => Some(left.clone()),
                _ => {
                    let (succ_key, succ_value) = min_entry(right).expect("right subtree non-leaf");
                    let new_right = remove(right, &succ_key).expect("successor key is present");
                    Some(Arc::new(Node::Branch {
                        key: succ_key,
                        value: succ_value,
                        left: left.clone(),
                        right: new_right,
                    }))
                }
            },
        },
    }
}

fn in_order<'a, K, V>(node: &'a Arc<Node<K, V>>, out: &mut Vec<(&'a K, &'a V)>) {
    if let Node::Branch { key, value, left, right } = node.as_ref() {
        in_order(left, out);
        out.push((key, value));
        in_order(right, out);
    }
}

pub struct PersistentSortedMap<K, V> {
    root: Arc<Node<K, V>>,
    len: usize,
}

impl<K, V> Clone for PersistentSortedMap<K, V> {
    fn clone(&self) -> Self {
        PersistentSortedMap { root: self.root.clone(), len: self.len }
    }
}

impl<K: Ord + Clone, V: Clone> Default for PersistentSortedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Clone> PersistentSortedMap<K, V> {
    pub fn new() -> Self {
        PersistentSortedMap { root: Arc::new(Node::Leaf), len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        get(&self.root, key)
    }

    pub fn assoc(&self, key: K, value: V) -> Self {
        let (new_root, added) = insert(&self.root, key, value);
        PersistentSortedMap { root: new_root, len: self.len + added as usize }
    }

    pub fn dissoc(&self, key: &K) -> Self {
        match remove(&self.root, key) {
            Some(new_root) => {
                let removed = self.get(key).is_some();
                PersistentSortedMap { root: new_root, len: self.len - removed as usize }
            }
            None => self.clone(),
        }
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        let mut out = Vec::with_capacity(self.len);
        in_order(&self.root, &mut out);
        out.into_iter()
    }

    pub fn first(&self) -> Option<(&K, &V)> {
        self.iter().next()
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> PartialEq for PersistentSortedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

pub struct PersistentSortedSet<T> {
    map: PersistentSortedMap<T, ()>,
}

impl<T: Ord + Clone> Default for PersistentSortedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone> PersistentSortedSet<T> {
    pub fn new() -> Self {
        PersistentSortedSet { map: PersistentSortedMap::new() }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.map.get(value).is_some()
    }

    pub fn conj(&self, value: T) -> Self {
        PersistentSortedSet { map: self.map.assoc(value, ()) }
    }

    pub fn disj(&self, value: &T) -> Self {
        PersistentSortedSet { map: self.map.dissoc(value) }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.map.iter().map(|(k, _)| k)
    }
}

impl<T: Ord + Clone> Clone for PersistentSortedSet<T> {
    fn clone(&self) -> Self {
        PersistentSortedSet { map: self.map.clone() }
    }
}

impl<T: Ord + Clone> PartialEq for PersistentSortedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_map_iterates_in_order() {
        let mut m = PersistentSortedMap::new();
        for k in [5, 1, 3, 2, 4] {
            m = m.assoc(k, k.to_string());
        }
        let keys: Vec<_> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn dissoc_preserves_ordering_invariant() {
        let mut m = PersistentSortedMap::new();
        for k in 0..20 {
            m = m.assoc(k, k);
        }
        let m2 = m.dissoc(&10);
        let keys: Vec<_> = m2.iter().map(|(k, _)| *k).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(!keys.contains(&10));
        assert_eq!(m.len(), 20);
        assert_eq!(m2.len(), 19);
    }

    #[test]
    fn sorted_set_basic() {
        let s = PersistentSortedSet::new().conj(3).conj(1).conj(2);
        assert_eq!(s.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(s.contains(&2));
        assert!(!s.disj(&2).contains(&2));
    }
}
