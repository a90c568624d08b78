//! An ordered key-value map backed by an AVL tree in an index arena.

// Conventions used in comments:
// - The balance factor of a node `x` is denoted `b(x)`.
// - `b(x)` is the height of `x`'s right subtree minus the height of its left
//   subtree, so positive values lean right and negative values lean left.
// - A subtree "shrinks" when a removal lowers its height by one.
//
// The fundamental invariants of an AVL tree are:
// 1. `b(x) ∈ {-1, 0, +1}` for every node `x`.
// 2. `b(x)` equals the measured height difference of `x`'s subtrees.
//
// While an insertion or removal is rebalancing, `b(x)` may transiently reach
// ±2 at the node under repair; a single or double rotation restores (1)
// before the operation returns. Only values in {-1, 0, +1} are ever stored.

use core::{
    cmp::Ordering,
    mem,
    ops::{Index, IndexMut, Not},
};
use std::borrow::Borrow;

mod debug;
#[cfg(any(test, feature = "model"))]
pub mod model;
#[cfg(test)]
mod tests;

/// A stable handle to a node slot in the arena.
///
/// A handle stays valid until the node it names is removed; the slot of a
/// removed node may be handed out again by a later insertion.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

type Link = Option<NodeId>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

impl Dir {
    // The contribution of a child on this side to its parent's balance
    // factor.
    #[inline]
    fn sign(self) -> i8 {
        match self {
            Dir::Left => -1,
            Dir::Right => 1,
        }
    }
}

/// A single map entry: the payload plus the links and balance bookkeeping
/// the tree engine needs.
struct Node<K, V> {
    key: K,
    value: V,
    parent: Link,
    children: [Link; 2],
    balance: i8,
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V) -> Node<K, V> {
        Node {
            key,
            value,
            parent: None,
            children: [None, None],
            balance: 0,
        }
    }

    #[inline]
    fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    fn value(&self) -> &V {
        &self.value
    }

    #[inline]
    fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    #[inline]
    fn into_payload(self) -> (K, V) {
        (self.key, self.value)
    }

    #[inline]
    fn parent(&self) -> Link {
        self.parent
    }

    // Sets the parent link, returning the previous one.
    #[inline]
    fn set_parent(&mut self, parent: Link) -> Link {
        mem::replace(&mut self.parent, parent)
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link {
        self.children[dir as usize]
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link) {
        self.children[dir as usize] = child;
    }

    #[inline]
    fn left(&self) -> Link {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link {
        self.child(Dir::Right)
    }

    #[inline]
    fn balance(&self) -> i8 {
        self.balance
    }

    #[inline]
    fn set_balance(&mut self, balance: i8) {
        debug_assert!((-1..=1).contains(&balance));
        self.balance = balance;
    }
}

// Slab-style node storage. Occupied slots hold live nodes; vacant slots
// chain into a free list and are reused before the backing vector grows.
enum Slot<K, V> {
    Occupied(Node<K, V>),
    Vacant { next_free: Link },
}

struct NodeArena<K, V> {
    slots: Vec<Slot<K, V>>,
    free_head: Link,
    len: usize,
}

impl<K, V> NodeArena<K, V> {
    const fn new() -> NodeArena<K, V> {
        NodeArena {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    const fn len(&self) -> usize {
        self.len
    }

    // Places `node` in a vacant slot, growing the backing vector if none is
    // free, and returns its handle.
    fn alloc(&mut self, node: Node<K, V>) -> NodeId {
        self.len += 1;

        match self.free_head {
            Some(id) => {
                let slot = mem::replace(&mut self.slots[id.index()], Slot::Occupied(node));
                match slot {
                    Slot::Vacant { next_free } => self.free_head = next_free,
                    Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
                }

                id
            }
            None => {
                let index =
                    u32::try_from(self.slots.len()).expect("arena grew past u32::MAX slots");
                self.slots.push(Slot::Occupied(node));

                NodeId(index)
            }
        }
    }

    // Marks the slot of `id` vacant and returns the node that occupied it.
    fn release(&mut self, id: NodeId) -> Node<K, V> {
        let next_free = self.free_head;
        let slot = mem::replace(&mut self.slots[id.index()], Slot::Vacant { next_free });

        match slot {
            Slot::Occupied(node) => {
                self.free_head = Some(id);
                self.len -= 1;

                node
            }
            Slot::Vacant { .. } => unreachable!("released a vacant slot"),
        }
    }

    // Exchanges the (key, value) payload of two distinct slots.
    //
    // Links and balance factors describe tree positions, not payloads, and
    // stay where they are.
    fn swap_payload(&mut self, a: NodeId, b: NodeId) {
        assert_ne!(a, b, "payload swap requires two distinct slots");

        let (low, high) = if a.index() < b.index() { (a, b) } else { (b, a) };
        let (front, back) = self.slots.split_at_mut(high.index());

        match (&mut front[low.index()], &mut back[0]) {
            (Slot::Occupied(x), Slot::Occupied(y)) => {
                mem::swap(&mut x.key, &mut y.key);
                mem::swap(&mut x.value, &mut y.value);
            }
            _ => unreachable!("payload swap on a vacant slot"),
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free_head = None;
        self.len = 0;
    }
}

impl<K, V> Index<NodeId> for NodeArena<K, V> {
    type Output = Node<K, V>;

    fn index(&self, id: NodeId) -> &Node<K, V> {
        match &self.slots[id.index()] {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => unreachable!("dangling node handle"),
        }
    }
}

impl<K, V> IndexMut<NodeId> for NodeArena<K, V> {
    fn index_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        match &mut self.slots[id.index()] {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => unreachable!("dangling node handle"),
        }
    }
}

/// An ordered map backed by an AVL tree.
///
/// Nodes live in a slab-style arena and refer to each other by index, so
/// the tree needs no unsafe pointer plumbing and removals never move other
/// entries. Lookup, insertion, and removal all complete in _O(log(n))_
/// time.
pub struct AvlMap<K: Ord, V> {
    arena: NodeArena<K, V>,
    root: Link,
}

impl<K: Ord, V> AvlMap<K, V> {
    /// Returns a new empty map.
    pub const fn new() -> AvlMap<K, V> {
        AvlMap {
            arena: NodeArena::new(),
            root: None,
        }
    }

    /// Returns `true` if the map contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the map.
    pub const fn len(&self) -> usize {
        self.arena.len()
    }

    /// Clears the map, removing all entries and releasing the arena.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.root = None;
    }

    /// Returns `true` if the map contains a value for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    /// Returns a reference to the value corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let id = self.get_raw(key)?;

        Some(self.arena[id].value())
    }

    /// Returns a mutable reference to the value corresponding to `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let id = self.get_raw(key)?;

        Some(self.arena[id].value_mut())
    }

    fn get_raw<Q>(&self, key: &Q) -> Link
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            match key.cmp(self.arena[cur].key().borrow()) {
                Ordering::Less => opt_cur = self.arena[cur].left(),
                Ordering::Equal => return Some(cur),
                Ordering::Greater => opt_cur = self.arena[cur].right(),
            }
        }
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already had this key, the value is overwritten in place
    /// and the old value is returned; the stored key and the shape of the
    /// tree are left untouched.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let Some(root) = self.root else {
            // Tree is empty. Set the new node as the root and return.
            let id = self.arena.alloc(Node::new(key, value));
            self.root = Some(id);

            return None;
        };

        // Descend the tree, looking for a vacant child link.
        let mut cur = root;
        let (parent, dir) = loop {
            match key.cmp(self.arena[cur].key()) {
                Ordering::Less => match self.arena[cur].left() {
                    Some(left) => cur = left,
                    None => break (cur, Dir::Left),
                },
                Ordering::Equal => {
                    return Some(mem::replace(self.arena[cur].value_mut(), value));
                }
                Ordering::Greater => match self.arena[cur].right() {
                    Some(right) => cur = right,
                    None => break (cur, Dir::Right),
                },
            }
        };

        let id = self.arena.alloc(Node::new(key, value));
        self.arena[id].set_parent(Some(parent));
        self.arena[parent].set_child(dir, Some(id));

        self.rebalance_inserted(id);

        None
    }

    /// Removes a key from the map, returning the value at the key if the
    /// key was previously in the map.
    ///
    /// `None` is the signal that the key was never present, as opposed to
    /// having just been removed.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let id = self.get_raw(key)?;
        let (_, value) = self.remove_at(id);

        Some(value)
    }

    // Unlinks the entry at `id`, rebalances the tree, and releases the
    // slot, returning the payload.
    fn remove_at(&mut self, id: NodeId) -> (K, V) {
        // A node with two children cannot be spliced out directly. Trade
        // payloads with the in-order predecessor, the rightmost node of the
        // left subtree, and splice that slot out instead: the predecessor
        // has no right child, and after the swap it carries the doomed
        // payload.
        let target = match (self.arena[id].left(), self.arena[id].right()) {
            (Some(left), Some(_)) => {
                let pred = self.max_in_subtree(left);
                self.arena.swap_payload(id, pred);

                pred
            }
            _ => id,
        };

        let child = self.arena[target].left().or(self.arena[target].right());
        let parent = self.arena[target].parent();

        self.maybe_set_parent(child, parent);

        match parent {
            Some(parent) => {
                let dir = self.which_child(parent, target);
                self.arena[parent].set_child(dir, child);
                self.rebalance_removed(parent, dir);
            }
            None => self.root = child,
        }

        self.arena.release(target).into_payload()
    }

    // Performs a bottom-up rebalance of the tree after the insertion of
    // `node`.
    //
    // On entry `node` is a fresh leaf with balance 0 and every ancestor's
    // balance factor still describes its pre-insertion subtrees.
    fn rebalance_inserted(&mut self, node: NodeId) {
        debug_assert_eq!(self.arena[node].balance(), 0);

        let mut child = node;

        while let Some(parent) = self.arena[child].parent() {
            let dir = self.which_child(parent, child);
            let balance = self.arena[parent].balance() + dir.sign();

            match balance {
                // The shorter subtree caught up; heights above are
                // unchanged.
                0 => {
                    self.arena[parent].set_balance(0);
                    break;
                }

                // `parent` was balanced and one subtree grew. Ascend.
                1 | -1 => {
                    self.arena[parent].set_balance(balance);
                    child = parent;
                }

                // `parent` was already heavy on the grown side. One
                // rotation restores its pre-insertion height, so the walk
                // ends here.
                2 | -2 => {
                    self.rebalance_heavy_inserted(parent, dir);
                    break;
                }

                _ => unreachable!("balance factor out of range: {balance}"),
            }
        }
    }

    // Resolves the transient ±2 balance at `node` after an insertion grew
    // its `dir` subtree.
    fn rebalance_heavy_inserted(&mut self, node: NodeId, dir: Dir) {
        let heavy = dir.sign();
        let child = self.arena[node]
            .child(dir)
            .expect("heavy side must have a child");

        match self.arena[child].balance() {
            // The child leans the same way as `node`: a single rotation
            // leaves both balanced.
            b if b == heavy => {
                self.rotate(node, !dir);
                self.arena[node].set_balance(0);
                self.arena[child].set_balance(0);
            }

            // The child leans away from `node`: its inner grandchild rises
            // to the top, and the grandchild's old lean decides which of
            // the displaced nodes comes up short.
            b if b == -heavy => {
                let grand = self.arena[child]
                    .child(!dir)
                    .expect("leaning child must have an inner grandchild");
                let grand_balance = self.arena[grand].balance();

                self.rotate(child, dir);
                self.rotate(node, !dir);

                self.set_double_rotation_balances(node, child, grand, grand_balance, heavy);
            }

            balance => unreachable!("freshly grown child cannot have balance {balance}"),
        }
    }

    // Performs a bottom-up rebalance of the tree after a removal shrank
    // the `dir` subtree of `parent`.
    fn rebalance_removed(&mut self, parent: NodeId, dir: Dir) {
        let mut node = parent;
        let mut shrunk = dir;

        loop {
            let balance = self.arena[node].balance() - shrunk.sign();

            match balance {
                // `node` was balanced; losing one level on one side leaves
                // its height unchanged, so nothing above can tell.
                1 | -1 => {
                    self.arena[node].set_balance(balance);
                    break;
                }

                // The taller subtree shrank down to match the other, so the
                // whole subtree is one level shorter. Ascend.
                0 => {
                    self.arena[node].set_balance(0);

                    let Some(parent) = self.arena[node].parent() else {
                        break;
                    };

                    shrunk = self.which_child(parent, node);
                    node = parent;
                }

                // The shorter subtree shrank further. Rotate, and keep
                // walking only if the rotation lowered the subtree.
                2 | -2 => {
                    let (top, shorter) = self.rebalance_heavy_removed(node, !shrunk);

                    if !shorter {
                        break;
                    }

                    let Some(parent) = self.arena[top].parent() else {
                        break;
                    };

                    shrunk = self.which_child(parent, top);
                    node = parent;
                }

                _ => unreachable!("balance factor out of range: {balance}"),
            }
        }
    }

    // Resolves the transient ±2 balance at `node` after a removal left it
    // heavy on the `dir` side.
    //
    // Returns the node now rooting this subtree and whether the subtree
    // lost height, in which case the caller must continue the walk.
    fn rebalance_heavy_removed(&mut self, node: NodeId, dir: Dir) -> (NodeId, bool) {
        let heavy = dir.sign();
        let child = self.arena[node]
            .child(dir)
            .expect("heavy side must have a child");

        match self.arena[child].balance() {
            // The heavy child is itself balanced, which never happens
            // during insertion. A single rotation tips the pair without
            // changing the subtree height, and the walk ends.
            0 => {
                self.rotate(node, !dir);
                self.arena[node].set_balance(heavy);
                self.arena[child].set_balance(-heavy);

                (child, false)
            }

            // The child leans the same way as `node`: a single rotation
            // leaves both balanced and the subtree one level shorter.
            b if b == heavy => {
                self.rotate(node, !dir);
                self.arena[node].set_balance(0);
                self.arena[child].set_balance(0);

                (child, true)
            }

            // The child leans away from `node`: double rotation, same
            // balance table as insertion, and the subtree ends one level
            // shorter.
            balance => {
                debug_assert_eq!(balance, -heavy);

                let grand = self.arena[child]
                    .child(!dir)
                    .expect("leaning child must have an inner grandchild");
                let grand_balance = self.arena[grand].balance();

                self.rotate(child, dir);
                self.rotate(node, !dir);

                self.set_double_rotation_balances(node, child, grand, grand_balance, heavy);

                (grand, true)
            }
        }
    }

    // Assigns the balance factors after a double rotation lifted `grand`
    // above `node` and `child`. `grand_balance` is the grandchild's balance
    // before the rotations and `heavy` the sign of the side `node` was
    // heavy on.
    fn set_double_rotation_balances(
        &mut self,
        node: NodeId,
        child: NodeId,
        grand: NodeId,
        grand_balance: i8,
        heavy: i8,
    ) {
        let (node_balance, child_balance) = if grand_balance == heavy {
            (-heavy, 0)
        } else if grand_balance == 0 {
            (0, 0)
        } else {
            (0, heavy)
        };

        self.arena[node].set_balance(node_balance);
        self.arena[child].set_balance(child_balance);
        self.arena[grand].set_balance(0);
    }

    // Rotates `down` in direction `dir`, lifting its `!dir` child into its
    // place: rotating left lifts the right child, rotating right lifts the
    // left child.
    //
    // The balance factors of the affected nodes are not updated.
    fn rotate(&mut self, down: NodeId, dir: Dir) {
        let up = self.arena[down]
            .child(!dir)
            .expect("rotation requires a child to lift");

        debug_assert!(self.root.map(|root| root != up).unwrap_or(false));

        // `across` moves from the `dir` side of `up` to the `!dir` side of
        // `down`.
        let across = self.arena[up].child(dir);
        self.arena[down].set_child(!dir, across);
        self.maybe_set_parent(across, Some(down));

        self.arena[up].set_child(dir, Some(down));
        let parent = self.arena[down].set_parent(Some(up));
        self.arena[up].set_parent(parent);

        self.replace_child_or_set_root(parent, down, Some(up));
    }

    fn maybe_set_parent(&mut self, opt_node: Link, parent: Link) {
        let Some(node) = opt_node else {
            return;
        };

        self.arena[node].set_parent(parent);
    }

    #[inline]
    fn replace_child_or_set_root(&mut self, parent: Link, old_child: NodeId, new_child: Link) {
        match parent {
            Some(parent) => self.replace_child(parent, old_child, new_child),
            None => self.root = new_child,
        }
    }

    // Replaces the child link of `parent` pointing at `old_child` with
    // `new_child`.
    //
    // `new_child`'s parent link is not updated.
    fn replace_child(&mut self, parent: NodeId, old_child: NodeId, new_child: Link) {
        if self.arena[parent].left() == Some(old_child) {
            self.arena[parent].set_child(Dir::Left, new_child);
        } else if self.arena[parent].right() == Some(old_child) {
            self.arena[parent].set_child(Dir::Right, new_child);
        } else {
            unreachable!("`old_child` must be a child of `parent`");
        }
    }

    #[inline]
    fn which_child(&self, parent: NodeId, child: NodeId) -> Dir {
        if self.arena[parent].left() == Some(child) {
            Dir::Left
        } else {
            debug_assert_eq!(self.arena[parent].right(), Some(child));
            Dir::Right
        }
    }

    // Returns the leftmost node in the subtree rooted at `root`.
    #[inline]
    fn min_in_subtree(&self, root: NodeId) -> NodeId {
        let mut cur = root;

        while let Some(left) = self.arena[cur].left() {
            cur = left;
        }

        cur
    }

    // Returns the rightmost node in the subtree rooted at `root`.
    #[inline]
    fn max_in_subtree(&self, root: NodeId) -> NodeId {
        let mut cur = root;

        while let Some(right) = self.arena[cur].right() {
            cur = right;
        }

        cur
    }

    // Returns the node holding the smallest key.
    fn first_raw(&self) -> Link {
        Some(self.min_in_subtree(self.root?))
    }

    // Returns the node holding the next key in sort order after `id`.
    fn successor_raw(&self, id: NodeId) -> Link {
        if let Some(right) = self.arena[id].right() {
            return Some(self.min_in_subtree(right));
        }

        let mut cur = id;

        loop {
            let parent = self.arena[cur].parent()?;

            if self.which_child(parent, cur) == Dir::Left {
                return Some(parent);
            }

            cur = parent;
        }
    }

    // Visits every entry in ascending key order.
    fn for_each_in_order<'a>(&'a self, mut visit: impl FnMut(&'a K, &'a V)) {
        let mut opt_cur = self.first_raw();

        while let Some(cur) = opt_cur {
            let node = &self.arena[cur];
            visit(node.key(), node.value());

            opt_cur = self.successor_raw(cur);
        }
    }

    /// Checks every structural and balance invariant of the tree, panicking
    /// if one does not hold.
    ///
    /// This is a test and fuzzing aid, not part of the supported API.
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.len(), 0, "empty tree with nonzero len");
            return;
        };

        assert_eq!(
            self.arena[root].parent(),
            None,
            "root must not have a parent"
        );

        let mut visited = 0;
        self.assert_invariants_at(root, &mut visited);
        assert_eq!(
            visited,
            self.len(),
            "len does not match the reachable node count"
        );

        // Keys must come out of the in-order walk strictly increasing.
        let mut prev: Option<&K> = None;
        self.for_each_in_order(|key, _| {
            if let Some(prev) = prev {
                assert!(prev < key, "in-order keys are not strictly increasing");
            }

            prev = Some(key);
        });
    }

    // Verifies the subtree rooted at `node`, returning its height.
    fn assert_invariants_at(&self, node: NodeId, visited: &mut usize) -> i32 {
        *visited += 1;

        let mut heights = [0i32; 2];

        for dir in [Dir::Left, Dir::Right] {
            if let Some(child) = self.arena[node].child(dir) {
                // Ensure the child's parent link points back at this node.
                assert_eq!(
                    self.arena[child].parent(),
                    Some(node),
                    "child's parent link does not point at its parent"
                );

                // Ensure keys are ordered across the link.
                match dir {
                    Dir::Left => assert!(self.arena[child].key() < self.arena[node].key()),
                    Dir::Right => assert!(self.arena[child].key() > self.arena[node].key()),
                }

                heights[dir as usize] = self.assert_invariants_at(child, visited);
            }
        }

        // Ensure the stored balance factor is the measured height
        // difference and within the AVL bound.
        let balance = heights[Dir::Right as usize] - heights[Dir::Left as usize];
        assert!(
            (-1..=1).contains(&balance),
            "height difference out of range: {balance}"
        );
        assert_eq!(
            i32::from(self.arena[node].balance()),
            balance,
            "stored balance factor does not match the measured height difference"
        );

        1 + heights[0].max(heights[1])
    }
}
