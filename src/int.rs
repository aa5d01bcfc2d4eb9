//! Integer-keyed trees.
//!
//! One generic implementation serves every scalar width; [`Tree32`],
//! [`Tree64`] and [`Tree128`] are the public instantiations. Descent
//! consumes one key bit per inner node, so every operation is bounded by
//! the key width rather than the population, and deletion by a constant.
//!
//! The signed operations map keys through a sign-bit flip, which lays
//! two's-complement order onto the unsigned descent; stored keys keep
//! their native representation.

use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::link::{Link, Root, INNER, LEAF, LEFT, RGHT, UNIQUE};
use crate::node::{self, Node};
use crate::scalar::Scalar;
use crate::stats::TreeStats;

/// A tree node carrying a scalar key.
///
/// Embed one in the stored object and hand the tree a pointer to it; the
/// memory stays owned by the caller for the whole time the node is linked.
/// The header must come first so tree links can address the node.
#[repr(C)]
pub struct IntNode<K: Scalar> {
    pub(crate) node: Node,
    pub(crate) key: K,
}

/// Node of a [`Tree32`].
pub type Node32 = IntNode<u32>;
/// Node of a [`Tree64`].
pub type Node64 = IntNode<u64>;
/// Node of a [`Tree128`].
pub type Node128 = IntNode<u128>;

impl<K: Scalar> IntNode<K> {
    /// A fresh unlinked node with the given key.
    pub const fn new(key: K) -> Self {
        IntNode {
            node: Node::new(),
            key,
        }
    }

    /// A fresh unlinked node keyed with a signed value. The tree orders
    /// it correctly only through the signed insert and lookup calls.
    pub fn new_signed(key: K::Signed) -> Self {
        IntNode {
            node: Node::new(),
            key: K::from_signed(key),
        }
    }

    pub fn key(&self) -> K {
        self.key
    }

    pub fn key_signed(&self) -> K::Signed {
        self.key.to_signed()
    }

    /// True while the node is linked in a tree.
    pub fn in_tree(&self) -> bool {
        self.node.in_tree()
    }
}

/// An elastic binary tree over unsigned `K` keys.
///
/// Storage for every node belongs to the caller, and the tree never
/// allocates. In exchange, all operations that follow node pointers are
/// `unsafe`: the caller guarantees that node pointers are valid and
/// unaliased, that linked nodes stay pinned in memory, and that the tree
/// value itself does not move while it holds nodes (the shallowest leaf
/// links back to the tree header). A node may be reinserted, in this or
/// any other tree, once it has been deleted.
///
/// # Examples
///
/// ```
/// use core::ptr::NonNull;
/// use ebtree::{Node32, Tree32};
///
/// let mut tree = Tree32::new();
/// let mut a = Box::new(Node32::new(8));
/// let mut b = Box::new(Node32::new(10));
/// unsafe {
///     tree.insert(NonNull::from(&mut *a));
///     tree.insert(NonNull::from(&mut *b));
///     assert_eq!(tree.first().unwrap().as_ref().key(), 8);
///     assert_eq!(tree.lookup_ge(9).unwrap().as_ref().key(), 10);
///     tree.delete(NonNull::from(&mut *a));
///     assert_eq!(tree.first().unwrap().as_ref().key(), 10);
/// }
/// ```
pub struct IntTree<K: Scalar> {
    root: Root,
    _key: PhantomData<K>,
}

/// Tree over `u32` keys.
pub type Tree32 = IntTree<u32>;
/// Tree over `u64` keys.
pub type Tree64 = IntTree<u64>;
/// Tree over `u128` keys.
pub type Tree128 = IntTree<u128>;

impl<K: Scalar> Default for IntTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Scalar> IntTree<K> {
    /// An empty tree accepting duplicate keys.
    pub const fn new() -> Self {
        IntTree {
            root: Root::new(),
            _key: PhantomData,
        }
    }

    /// An empty tree rejecting duplicate keys: inserting a key already
    /// present returns the incumbent node and links nothing.
    pub const fn new_unique() -> Self {
        IntTree {
            root: Root::new_unique(),
            _key: PhantomData,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn is_unique(&self) -> bool {
        self.root.is_unique()
    }

    /// The entry with the lowest key, oldest first among duplicates.
    pub unsafe fn first(&self) -> Option<NonNull<IntNode<K>>> {
        node::first(&self.root).map(NonNull::cast)
    }

    /// The entry with the highest key, newest first among duplicates.
    pub unsafe fn last(&self) -> Option<NonNull<IntNode<K>>> {
        node::last(&self.root).map(NonNull::cast)
    }

    /// The entry after `node` in ascending order. Duplicates are visited
    /// in insertion order.
    pub unsafe fn next(&self, node: NonNull<IntNode<K>>) -> Option<NonNull<IntNode<K>>> {
        node::next(node.cast()).map(NonNull::cast)
    }

    /// The entry before `node` in ascending order.
    pub unsafe fn prev(&self, node: NonNull<IntNode<K>>) -> Option<NonNull<IntNode<K>>> {
        node::prev(node.cast()).map(NonNull::cast)
    }

    /// The next entry with a key different from `node`'s.
    pub unsafe fn next_unique(&self, node: NonNull<IntNode<K>>) -> Option<NonNull<IntNode<K>>> {
        node::next_unique(node.cast()).map(NonNull::cast)
    }

    /// The previous entry with a key different from `node`'s.
    pub unsafe fn prev_unique(&self, node: NonNull<IntNode<K>>) -> Option<NonNull<IntNode<K>>> {
        node::prev_unique(node.cast()).map(NonNull::cast)
    }

    /// Unlinks `node`. Only the deleted node is invalidated; every other
    /// entry and every cursor on it stays usable. Idempotent: deleting an
    /// unlinked node does nothing.
    pub unsafe fn delete(&mut self, node: NonNull<IntNode<K>>) {
        node::delete(node.cast());
    }

    /// Links `new` into the tree and returns it, keeping duplicates in
    /// insertion order. In a unique tree an equal key makes the insert
    /// return the incumbent instead; compare the returned pointer with
    /// `new` to detect that.
    pub unsafe fn insert(&mut self, new: NonNull<IntNode<K>>) -> NonNull<IntNode<K>> {
        insert_by(&mut self.root, new, K::ZERO)
    }

    /// Signed-order insert of a node built with [`IntNode::new_signed`].
    pub unsafe fn insert_signed(&mut self, new: NonNull<IntNode<K>>) -> NonNull<IntNode<K>> {
        insert_by(&mut self.root, new, K::SIGN)
    }

    /// The oldest entry with exactly this key.
    pub unsafe fn lookup(&self, key: K) -> Option<NonNull<IntNode<K>>> {
        lookup_by(&self.root, key, K::ZERO)
    }

    /// Signed-order exact lookup.
    pub unsafe fn lookup_signed(&self, key: K::Signed) -> Option<NonNull<IntNode<K>>> {
        lookup_by(&self.root, K::from_signed(key), K::SIGN)
    }

    /// The last entry with a key lower than or equal to `key`.
    pub unsafe fn lookup_le(&self, key: K) -> Option<NonNull<IntNode<K>>> {
        lookup_le_in(&self.root, key)
    }

    /// The first entry with a key greater than or equal to `key`.
    pub unsafe fn lookup_ge(&self, key: K) -> Option<NonNull<IntNode<K>>> {
        lookup_ge_in(&self.root, key)
    }

    /// Shape and population figures, gathered with a full walk.
    pub unsafe fn stats(&self) -> TreeStats {
        TreeStats::collect(&self.root)
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> &Root {
        &self.root
    }
}

/// Shared insert body. `mask` is zero for unsigned order or the sign bit
/// for signed order; xor-derived quantities are mask-invariant, so only
/// branch picking and the final ordering compare go through it.
unsafe fn insert_by<K: Scalar>(
    root: &mut Root,
    new: NonNull<IntNode<K>>,
    mask: K,
) -> NonNull<IntNode<K>> {
    let root: *mut Root = root;
    let new_ptr = new.as_ptr();
    let new_branches: NonNull<Root> = new.cast();

    let mut side = LEFT;
    let mut troot = (*root).b[LEFT];
    let root_right = (*root).b[RGHT];

    if troot.is_none() {
        // empty tree: the first entry needs no inner role
        (*root).b[LEFT] = Link::new(new_branches, LEAF);
        (*new_ptr).node.leaf_p = Link::new(NonNull::new_unchecked(root), LEFT);
        (*new_ptr).node.node_p = Link::NONE;
        return new;
    }

    let key = (*new_ptr).key;
    let needle = key ^ mask;

    let mut cur: *mut Root = root;
    let old: *mut IntNode<K>;
    let up_ptr: *mut Link;

    loop {
        if troot.tag() == LEAF {
            // splice above this leaf
            let o: *mut IntNode<K> = node::refer(troot).cast().as_ptr();
            (*new_ptr).node.node_p = (*o).node.leaf_p;
            up_ptr = &mut (*o).node.leaf_p;
            old = o;
            break;
        }

        let o: *mut IntNode<K> = node::refer(troot).cast().as_ptr();
        let old_bit = (*o).node.bit;

        // Stop in front of a duplicate subtree, or as soon as the keys no
        // longer share the bits that brought us down here.
        if old_bit < 0 || (key ^ (*o).key).above(old_bit as u32) {
            (*new_ptr).node.node_p = (*o).node.node_p;
            up_ptr = &mut (*o).node.node_p;
            old = o;
            break;
        }

        cur = &mut (*o).node.branches;
        side = needle.branch(old_bit as u32);
        troot = (*cur).b[side];
    }

    let new_left = Link::new(new_branches, LEFT);
    let new_rght = Link::new(new_branches, RGHT);
    let new_leaf = Link::new(new_branches, LEAF);

    let old_key = (*old).key;

    if key == old_key {
        (*new_ptr).node.bit = -1;
        if root_right.tag() == UNIQUE {
            return NonNull::new_unchecked(old);
        }
        if troot.tag() != LEAF {
            // an equal key already grew a subtree; join it
            return node::insert_dup(NonNull::new_unchecked(old).cast(), new.cast()).cast();
        }
        // first duplicate of a plain leaf: fall through, the new node
        // becomes the subtree root with the old leaf on its left
    } else {
        // the highest differing position is the new branch level
        (*new_ptr).node.bit = ((key ^ old_key).fls() - 1) as i16;
    }

    if needle >= (old_key ^ mask) {
        (*new_branches.as_ptr()).b[LEFT] = troot;
        (*new_branches.as_ptr()).b[RGHT] = new_leaf;
        (*new_ptr).node.leaf_p = new_rght;
        *up_ptr = new_left;
    } else {
        (*new_branches.as_ptr()).b[LEFT] = new_leaf;
        (*new_branches.as_ptr()).b[RGHT] = troot;
        (*new_ptr).node.leaf_p = new_left;
        *up_ptr = new_rght;
    }

    (*cur).b[side] = Link::new(new_branches, INNER);
    new
}

/// Shared exact-lookup body; see [`insert_by`] for the mask convention.
unsafe fn lookup_by<K: Scalar>(root: &Root, key: K, mask: K) -> Option<NonNull<IntNode<K>>> {
    let mut troot = root.b[LEFT];
    if troot.is_none() {
        return None;
    }
    let needle = key ^ mask;

    loop {
        if troot.tag() == LEAF {
            let n: NonNull<IntNode<K>> = node::refer(troot).cast();
            if (*n.as_ptr()).key == key {
                return Some(n);
            }
            return None;
        }

        let n: NonNull<IntNode<K>> = node::refer(troot).cast();
        let bit = (*n.as_ptr()).node.bit;
        let nkey = (*n.as_ptr()).key;

        if nkey == key {
            if bit < 0 {
                // equal keys grew a subtree; the oldest entry is its
                // leftmost leaf
                return node::walk_down((*n.as_ptr()).node.branches.b[LEFT], LEFT)
                    .map(NonNull::cast);
            }
            return Some(n);
        }

        if bit < 0 || (nkey ^ key).above(bit as u32) {
            // a subtree for some other key, or no common bits left
            return None;
        }

        troot = (*n.as_ptr()).node.branches.b[needle.branch(bit as u32)];
    }
}

unsafe fn lookup_le_in<K: Scalar>(root: &Root, key: K) -> Option<NonNull<IntNode<K>>> {
    let mut troot = root.b[LEFT];
    if troot.is_none() {
        return None;
    }

    loop {
        if troot.tag() == LEAF {
            // every upper bit matched: this leaf fits, or its predecessor
            // does
            let n: NonNull<IntNode<K>> = node::refer(troot).cast();
            if (*n.as_ptr()).key <= key {
                return Some(n);
            }
            troot = (*n.as_ptr()).node.leaf_p;
            break;
        }

        let n: NonNull<IntNode<K>> = node::refer(troot).cast();
        let bit = (*n.as_ptr()).node.bit;
        let nkey = (*n.as_ptr()).key;

        if bit < 0 {
            // top of a duplicate subtree: a match takes its newest entry,
            // a mismatch falls back to the predecessor of the whole
            // subtree
            if nkey <= key {
                return node::walk_down((*n.as_ptr()).node.branches.b[RGHT], RGHT)
                    .map(NonNull::cast);
            }
            troot = (*n.as_ptr()).node.node_p;
            break;
        }

        if (nkey ^ key).above(bit as u32) {
            // the subtree diverges above its own level, so it lies wholly
            // below or wholly above the needle
            if nkey.shr(bit as u32) < key.shr(bit as u32) {
                return node::walk_down((*n.as_ptr()).node.branches.b[RGHT], RGHT)
                    .map(NonNull::cast);
            }
            troot = (*n.as_ptr()).node.node_p;
            break;
        }

        troot = (*n.as_ptr()).node.branches.b[key.branch(bit as u32)];
    }

    // predecessor: climb until we stop hanging on a left branch, then take
    // the nearest subtree on the left from above
    while troot.tag() == LEFT {
        if (*troot.ptr()).b[RGHT].is_none() {
            return None;
        }
        troot = (*node::refer(troot).as_ptr()).node_p;
    }
    node::walk_down((*troot.ptr()).b[LEFT], RGHT).map(NonNull::cast)
}

unsafe fn lookup_ge_in<K: Scalar>(root: &Root, key: K) -> Option<NonNull<IntNode<K>>> {
    let mut troot = root.b[LEFT];
    if troot.is_none() {
        return None;
    }

    loop {
        if troot.tag() == LEAF {
            let n: NonNull<IntNode<K>> = node::refer(troot).cast();
            if (*n.as_ptr()).key >= key {
                return Some(n);
            }
            troot = (*n.as_ptr()).node.leaf_p;
            break;
        }

        let n: NonNull<IntNode<K>> = node::refer(troot).cast();
        let bit = (*n.as_ptr()).node.bit;
        let nkey = (*n.as_ptr()).key;

        if bit < 0 {
            // a matching duplicate subtree answers with its oldest entry
            if nkey >= key {
                return node::walk_down((*n.as_ptr()).node.branches.b[LEFT], LEFT)
                    .map(NonNull::cast);
            }
            troot = (*n.as_ptr()).node.node_p;
            break;
        }

        if (nkey ^ key).above(bit as u32) {
            if nkey.shr(bit as u32) > key.shr(bit as u32) {
                return node::walk_down((*n.as_ptr()).node.branches.b[LEFT], LEFT)
                    .map(NonNull::cast);
            }
            troot = (*n.as_ptr()).node.node_p;
            break;
        }

        troot = (*n.as_ptr()).node.branches.b[key.branch(bit as u32)];
    }

    // successor: climb until we hang on a left branch, then take the
    // nearest subtree on the right from above
    while troot.tag() != LEFT {
        troot = (*node::refer(troot).as_ptr()).node_p;
    }
    let down = (*troot.ptr()).b[RGHT];
    if down.is_none() {
        return None;
    }
    node::walk_down(down, LEFT).map(NonNull::cast)
}
