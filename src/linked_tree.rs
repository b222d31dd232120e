use std::cmp::Ordering;

use slab::Slab;

/// Comparator carried by an ordered collection.
///
/// Stored inside the tree so one tree can be ordered by state the key
/// itself does not carry (e.g. a chain's split abscissa).
pub trait Compare<K> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

impl<K, F> Compare<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        (self)(a, b)
    }
}

/// Handle to a live node of a [`LinkedTree`].
///
/// A handle is invalidated when its node is removed; the slot may be
/// reused by a later insertion. Callers holding handles across
/// removals must resolve the data they need first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node<K> {
    key: K,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
    // In-order neighbor threading, maintained through rotations and
    // splices.
    prev: Option<usize>,
    next: Option<usize>,
    height: u8,
    size: usize,
}

impl<K> Node<K> {
    fn new(key: K) -> Self {
        Node {
            key,
            parent: None,
            left: None,
            right: None,
            prev: None,
            next: None,
            height: 1,
            size: 1,
        }
    }
}

/// An order-statistics AVL tree with intrusive in-order links.
///
/// Nodes live in a [`Slab`] and reference each other by slot index, so
/// the structure has no shared ownership anywhere. On top of the usual
/// ordered-set operations it provides O(1) `first`/`last`/`next`/`prev`
/// via the neighbor threading, k-th element access via subtree sizes,
/// and direct root/child access for comparator-guided descent.
pub struct LinkedTree<K, C> {
    nodes: Slab<Node<K>>,
    root: Option<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    cmp: C,
}

impl<K, C: Compare<K>> LinkedTree<K, C> {
    pub fn new(cmp: C) -> Self {
        LinkedTree {
            nodes: Slab::new(),
            root: None,
            head: None,
            tail: None,
            cmp,
        }
    }

    pub fn with_capacity(cmp: C, capacity: usize) -> Self {
        LinkedTree {
            nodes: Slab::with_capacity(capacity),
            ..Self::new(cmp)
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The stored comparator.
    #[inline]
    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    #[inline]
    pub fn key(&self, id: NodeId) -> &K {
        &self.nodes[id.0].key
    }

    /// Whether `id` currently refers to a live node of this tree.
    #[inline]
    pub fn contains_id(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        self.root.map(NodeId)
    }

    #[inline]
    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].left.map(NodeId)
    }

    #[inline]
    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].right.map(NodeId)
    }

    /// Minimum node, O(1).
    #[inline]
    pub fn first(&self) -> Option<NodeId> {
        self.head.map(NodeId)
    }

    /// Maximum node, O(1).
    #[inline]
    pub fn last(&self) -> Option<NodeId> {
        self.tail.map(NodeId)
    }

    /// In-order successor, O(1).
    #[inline]
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].next.map(NodeId)
    }

    /// In-order predecessor, O(1).
    #[inline]
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].prev.map(NodeId)
    }

    /// The k-th smallest node, O(log n).
    pub fn get(&self, index: usize) -> Option<NodeId> {
        if index >= self.len() {
            return None;
        }
        let mut i = self.root?;
        let mut index = index;
        loop {
            let left_size = self.nodes[i].left.map(|l| self.nodes[l].size).unwrap_or(0);
            if index < left_size {
                i = self.nodes[i].left.expect("left subtree larger than index");
            } else if index == left_size {
                return Some(NodeId(i));
            } else {
                index -= left_size + 1;
                i = self.nodes[i].right.expect("index within subtree size");
            }
        }
    }

    /// Locates the node comparing equal to `key`.
    pub fn find(&self, key: &K) -> Option<NodeId> {
        let mut cur = self.root?;
        loop {
            match self.cmp.compare(key, &self.nodes[cur].key) {
                Ordering::Less => cur = self.nodes[cur].left?,
                Ordering::Greater => cur = self.nodes[cur].right?,
                Ordering::Equal => return Some(NodeId(cur)),
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Inserts `key`; returns `None` if an equal key is present.
    /// O(log n).
    pub fn insert(&mut self, key: K) -> Option<NodeId> {
        let mut cur = match self.root {
            None => {
                let i = self.nodes.insert(Node::new(key));
                self.root = Some(i);
                self.head = Some(i);
                self.tail = Some(i);
                return Some(NodeId(i));
            }
            Some(r) => r,
        };
        let go_left = loop {
            match self.cmp.compare(&key, &self.nodes[cur].key) {
                Ordering::Less => match self.nodes[cur].left {
                    Some(l) => cur = l,
                    None => break true,
                },
                Ordering::Greater => match self.nodes[cur].right {
                    Some(r) => cur = r,
                    None => break false,
                },
                Ordering::Equal => return None,
            }
        };

        let i = self.nodes.insert(Node::new(key));
        self.nodes[i].parent = Some(cur);
        if go_left {
            self.nodes[cur].left = Some(i);
            let prev = self.nodes[cur].prev;
            self.nodes[i].prev = prev;
            self.nodes[i].next = Some(cur);
            self.nodes[cur].prev = Some(i);
            match prev {
                Some(p) => self.nodes[p].next = Some(i),
                None => self.head = Some(i),
            }
        } else {
            self.nodes[cur].right = Some(i);
            let next = self.nodes[cur].next;
            self.nodes[i].next = next;
            self.nodes[i].prev = Some(cur);
            self.nodes[cur].next = Some(i);
            match next {
                Some(n) => self.nodes[n].prev = Some(i),
                None => self.tail = Some(i),
            }
        }
        self.retrace(Some(cur));
        Some(NodeId(i))
    }

    /// Removes the node comparing equal to `key`. O(log n).
    pub fn remove(&mut self, key: &K) -> Option<K> {
        let id = self.find(key)?;
        Some(self.remove_node(id))
    }

    /// Removes the node behind `id`, which must be live. O(log n).
    pub fn remove_node(&mut self, id: NodeId) -> K {
        let i = id.0;
        // Unthread the neighbor links first.
        let (prev, next) = (self.nodes[i].prev, self.nodes[i].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }

        let parent = self.nodes[i].parent;
        let left = self.nodes[i].left;
        let right = self.nodes[i].right;

        let retrace_from = match (left, right) {
            (_, None) => {
                self.replace_child(parent, i, left);
                parent
            }
            (None, Some(r)) => {
                self.replace_child(parent, i, Some(r));
                parent
            }
            (Some(l), Some(r)) => {
                // The in-order successor has no left child; splice it
                // into the removed node's position so every other
                // node keeps its slot.
                let s = next.expect("node with a right child has a successor");
                if s == r {
                    self.replace_child(parent, i, Some(s));
                    self.nodes[s].left = Some(l);
                    self.nodes[l].parent = Some(s);
                    Some(s)
                } else {
                    let sp = self.nodes[s].parent.expect("successor below the removed node");
                    let sr = self.nodes[s].right;
                    self.replace_child(Some(sp), s, sr);
                    self.replace_child(parent, i, Some(s));
                    self.nodes[s].left = Some(l);
                    self.nodes[l].parent = Some(s);
                    self.nodes[s].right = Some(r);
                    self.nodes[r].parent = Some(s);
                    Some(sp)
                }
            }
        };
        self.retrace(retrace_from);
        self.nodes.remove(i).key
    }

    /// Keeps only the keys satisfying `pred`; returns whether any node
    /// was removed. O(k log n).
    pub fn retain<F: FnMut(&K) -> bool>(&mut self, mut pred: F) -> bool {
        let mut doomed = Vec::new();
        let mut cur = self.head;
        while let Some(i) = cur {
            if !pred(&self.nodes[i].key) {
                doomed.push(i);
            }
            cur = self.nodes[i].next;
        }
        let modified = !doomed.is_empty();
        for i in doomed {
            self.remove_node(NodeId(i));
        }
        modified
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.head = None;
        self.tail = None;
    }

    /// Ascending key iterator over the neighbor threading.
    pub fn iter(&self) -> Iter<'_, K, C> {
        Iter {
            tree: self,
            cur: self.head,
        }
    }

    fn replace_child(&mut self, parent: Option<usize>, old: usize, new: Option<usize>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                if self.nodes[p].left == Some(old) {
                    self.nodes[p].left = new;
                } else {
                    self.nodes[p].right = new;
                }
            }
        }
        if let Some(n) = new {
            self.nodes[n].parent = parent;
        }
    }

    #[inline]
    fn height_of(&self, n: Option<usize>) -> u8 {
        n.map(|i| self.nodes[i].height).unwrap_or(0)
    }

    #[inline]
    fn size_of(&self, n: Option<usize>) -> usize {
        n.map(|i| self.nodes[i].size).unwrap_or(0)
    }

    fn update(&mut self, i: usize) {
        let (l, r) = (self.nodes[i].left, self.nodes[i].right);
        self.nodes[i].height = 1 + self.height_of(l).max(self.height_of(r));
        self.nodes[i].size = 1 + self.size_of(l) + self.size_of(r);
    }

    #[inline]
    fn balance(&self, i: usize) -> i32 {
        self.height_of(self.nodes[i].left) as i32 - self.height_of(self.nodes[i].right) as i32
    }

    /// Recomputes heights/sizes and rebalances from `from` up to the
    /// root.
    fn retrace(&mut self, from: Option<usize>) {
        let mut cur = from;
        while let Some(i) = cur {
            self.update(i);
            let balance = self.balance(i);
            let i = if balance > 1 {
                let l = self.nodes[i].left.expect("left-heavy node has a left child");
                if self.balance(l) < 0 {
                    self.rotate_left(l);
                }
                self.rotate_right(i)
            } else if balance < -1 {
                let r = self.nodes[i].right.expect("right-heavy node has a right child");
                if self.balance(r) > 0 {
                    self.rotate_right(r);
                }
                self.rotate_left(i)
            } else {
                i
            };
            cur = self.nodes[i].parent;
        }
    }

    fn rotate_left(&mut self, x: usize) -> usize {
        let y = self.nodes[x].right.expect("rotate_left requires a right child");
        let t = self.nodes[y].left;
        let p = self.nodes[x].parent;
        self.nodes[x].right = t;
        if let Some(t) = t {
            self.nodes[t].parent = Some(x);
        }
        self.nodes[y].left = Some(x);
        self.nodes[x].parent = Some(y);
        self.replace_child_raw(p, x, y);
        self.update(x);
        self.update(y);
        y
    }

    fn rotate_right(&mut self, x: usize) -> usize {
        let y = self.nodes[x].left.expect("rotate_right requires a left child");
        let t = self.nodes[y].right;
        let p = self.nodes[x].parent;
        self.nodes[x].left = t;
        if let Some(t) = t {
            self.nodes[t].parent = Some(x);
        }
        self.nodes[y].right = Some(x);
        self.nodes[x].parent = Some(y);
        self.replace_child_raw(p, x, y);
        self.update(x);
        self.update(y);
        y
    }

    fn replace_child_raw(&mut self, parent: Option<usize>, old: usize, new: usize) {
        self.nodes[new].parent = parent;
        match parent {
            None => self.root = Some(new),
            Some(p) => {
                if self.nodes[p].left == Some(old) {
                    self.nodes[p].left = Some(new);
                } else {
                    self.nodes[p].right = Some(new);
                }
            }
        }
    }
}

pub struct Iter<'a, K, C> {
    tree: &'a LinkedTree<K, C>,
    cur: Option<usize>,
}

impl<'a, K, C> Iterator for Iter<'a, K, C> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.cur?;
        self.cur = self.tree.nodes[i].next;
        Some(&self.tree.nodes[i].key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn int_tree() -> LinkedTree<i64, fn(&i64, &i64) -> Ordering> {
        LinkedTree::new(|a: &i64, b: &i64| a.cmp(b))
    }

    /// Recursively verifies ordering, AVL balance, sizes, parent links
    /// and the neighbor threading.
    fn check_invariants(tree: &LinkedTree<i64, fn(&i64, &i64) -> Ordering>) {
        fn walk(
            tree: &LinkedTree<i64, fn(&i64, &i64) -> Ordering>,
            id: NodeId,
            out: &mut Vec<i64>,
        ) -> (u8, usize) {
            let (lh, ls) = match tree.left(id) {
                Some(l) => {
                    assert_eq!(tree.nodes[l.0].parent, Some(id.0));
                    walk(tree, l, out)
                }
                None => (0, 0),
            };
            out.push(*tree.key(id));
            let (rh, rs) = match tree.right(id) {
                Some(r) => {
                    assert_eq!(tree.nodes[r.0].parent, Some(id.0));
                    walk(tree, r, out)
                }
                None => (0, 0),
            };
            assert!((lh as i32 - rh as i32).abs() <= 1, "unbalanced node");
            assert_eq!(tree.nodes[id.0].height, 1 + lh.max(rh));
            assert_eq!(tree.nodes[id.0].size, 1 + ls + rs);
            (1 + lh.max(rh), 1 + ls + rs)
        }

        let mut in_order = Vec::new();
        if let Some(root) = tree.root() {
            assert_eq!(tree.nodes[root.0].parent, None);
            walk(tree, root, &mut in_order);
        }
        assert!(in_order.windows(2).all(|w| w[0] < w[1]), "keys out of order");
        let threaded: Vec<i64> = tree.iter().copied().collect();
        assert_eq!(in_order, threaded, "threading disagrees with tree order");
        assert_eq!(tree.len(), in_order.len());
        assert_eq!(tree.first().map(|i| *tree.key(i)), in_order.first().copied());
        assert_eq!(tree.last().map(|i| *tree.key(i)), in_order.last().copied());
    }

    #[test]
    fn test_insert_ordering() {
        let mut tree = int_tree();
        for v in [5, 3, 8, 1, 4, 7, 9, 2, 6, 0] {
            assert!(tree.insert(v).is_some());
        }
        assert!(tree.insert(5).is_none());
        check_invariants(&tree);
        let keys: Vec<i64> = tree.iter().copied().collect();
        assert_eq!(keys, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_kth_and_neighbors() {
        let mut tree = int_tree();
        for v in 0..100 {
            tree.insert(v * 2);
        }
        for k in 0..100 {
            let id = tree.get(k).unwrap();
            assert_eq!(*tree.key(id), (k as i64) * 2);
        }
        assert!(tree.get(100).is_none());

        let id = tree.get(50).unwrap();
        assert_eq!(*tree.key(tree.next(id).unwrap()), 102);
        assert_eq!(*tree.key(tree.prev(id).unwrap()), 98);
        assert!(tree.next(tree.last().unwrap()).is_none());
        assert!(tree.prev(tree.first().unwrap()).is_none());
    }

    #[test]
    fn test_remove_cases() {
        let mut tree = int_tree();
        for v in 0..32 {
            tree.insert(v);
        }
        // Leaf, one-child and two-children removals, including the
        // root.
        for v in [31, 16, 0, 15, 8, 23] {
            assert_eq!(tree.remove(&v), Some(v));
            assert!(!tree.contains(&v));
            check_invariants(&tree);
        }
        assert_eq!(tree.remove(&16), None);
        assert_eq!(tree.len(), 26);
    }

    #[test]
    fn test_handles_stable_across_removals() {
        let mut tree = int_tree();
        let ids: Vec<NodeId> = (0..20).map(|v| tree.insert(v).unwrap()).collect();
        tree.remove(&7);
        tree.remove(&13);
        for (v, id) in ids.iter().enumerate() {
            if v == 7 || v == 13 {
                continue;
            }
            assert_eq!(*tree.key(*id), v as i64);
        }
    }

    #[test]
    fn test_retain() {
        let mut tree = int_tree();
        for v in 0..50 {
            tree.insert(v);
        }
        assert!(tree.retain(|k| k % 3 == 0));
        assert!(!tree.retain(|k| k % 3 == 0));
        check_invariants(&tree);
        let keys: Vec<i64> = tree.iter().copied().collect();
        assert_eq!(keys, (0..50).filter(|k| k % 3 == 0).collect::<Vec<_>>());
    }

    #[test]
    fn test_randomized_against_btreeset() {
        use std::collections::BTreeSet;
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = int_tree();
        let mut reference = BTreeSet::new();
        for _ in 0..2000 {
            let v = rng.gen_range(0..300);
            if rng.gen_bool(0.6) {
                assert_eq!(tree.insert(v).is_some(), reference.insert(v));
            } else {
                assert_eq!(tree.remove(&v).is_some(), reference.remove(&v));
            }
        }
        check_invariants(&tree);
        let keys: Vec<i64> = tree.iter().copied().collect();
        let expected: Vec<i64> = reference.iter().copied().collect();
        assert_eq!(keys, expected);
    }
}
