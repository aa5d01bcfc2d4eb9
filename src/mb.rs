//! Fixed-length byte-string trees.
//!
//! Keys are `N`-byte arrays compared high-bit-first, so enumeration order
//! is byte-lexicographic. Unlike the scalar trees, an ordinary inner node
//! stores the count of leading bits shared by everything below it rather
//! than a bit position, and descent verifies bytes with [`equal_bits`]
//! instead of shift-and-mask.
//!
//! Two insert families exist and must not be mixed on one tree:
//!
//! - [`MbTree::insert`] / [`MbTree::lookup`] handle whole keys;
//! - [`MbTree::insert_prefix`] / [`MbTree::lookup_longest`] /
//!   [`MbTree::lookup_prefix`] handle (key, prefix-length) pairs and
//!   support longest-prefix matching.
//!
//! Prefix trees double every stored bit count: an ordinary node at count
//! `p` stores `2p + 1`, while a *cover* node for prefix length `p` stores
//! `2p`. A cover node keeps the entries whose prefix ends at `p` on its
//! left branch and the longer, covered entries on its right branch, so a
//! descent can remember the most specific covering entry seen so far and
//! fall back to it when the needle diverges.

use core::ptr::NonNull;

use crate::bits::{check_bits, cmp_bits, equal_bits, get_bit};
use crate::link::{Link, Root, INNER, LEAF, LEFT, RGHT, UNIQUE};
use crate::node::{self, Node};
use crate::stats::TreeStats;

/// A tree node carrying an `N`-byte key.
///
/// Bit counts are stored in 16 bits, which caps usable keys at 2047 bytes
/// for prefix trees and 4095 bytes otherwise.
#[repr(C)]
pub struct MbNode<const N: usize> {
    pub(crate) node: Node,
    pub(crate) key: [u8; N],
}

impl<const N: usize> MbNode<N> {
    /// A fresh unlinked node with the given key, for whole-key trees.
    pub const fn new(key: [u8; N]) -> Self {
        MbNode {
            node: Node::new(),
            key,
        }
    }

    /// A fresh unlinked prefix entry: only the first `pfx` bits of `key`
    /// are significant, and every bit past them must be zero.
    pub fn new_prefix(key: [u8; N], pfx: u16) -> Self {
        debug_assert!(pfx as usize <= N * 8);
        let mut node = Node::new();
        node.pfx = pfx;
        MbNode { node, key }
    }

    pub fn key(&self) -> &[u8; N] {
        &self.key
    }

    /// Prefix length in bits; meaningful for prefix entries only.
    pub fn pfx(&self) -> u16 {
        self.node.pfx
    }

    /// True while the node is linked in a tree.
    pub fn in_tree(&self) -> bool {
        self.node.in_tree()
    }
}

/// An elastic binary tree over `N`-byte keys.
///
/// Same ownership and pinning contract as [`crate::IntTree`].
pub struct MbTree<const N: usize> {
    root: Root,
}

impl<const N: usize> Default for MbTree<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MbTree<N> {
    /// An empty tree accepting duplicate keys.
    pub const fn new() -> Self {
        MbTree { root: Root::new() }
    }

    /// An empty tree rejecting duplicate keys.
    pub const fn new_unique() -> Self {
        MbTree {
            root: Root::new_unique(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn is_unique(&self) -> bool {
        self.root.is_unique()
    }

    pub unsafe fn first(&self) -> Option<NonNull<MbNode<N>>> {
        node::first(&self.root).map(NonNull::cast)
    }

    pub unsafe fn last(&self) -> Option<NonNull<MbNode<N>>> {
        node::last(&self.root).map(NonNull::cast)
    }

    pub unsafe fn next(&self, node: NonNull<MbNode<N>>) -> Option<NonNull<MbNode<N>>> {
        node::next(node.cast()).map(NonNull::cast)
    }

    pub unsafe fn prev(&self, node: NonNull<MbNode<N>>) -> Option<NonNull<MbNode<N>>> {
        node::prev(node.cast()).map(NonNull::cast)
    }

    pub unsafe fn next_unique(&self, node: NonNull<MbNode<N>>) -> Option<NonNull<MbNode<N>>> {
        node::next_unique(node.cast()).map(NonNull::cast)
    }

    pub unsafe fn prev_unique(&self, node: NonNull<MbNode<N>>) -> Option<NonNull<MbNode<N>>> {
        node::prev_unique(node.cast()).map(NonNull::cast)
    }

    /// Unlinks `node`; idempotent on unlinked nodes.
    pub unsafe fn delete(&mut self, node: NonNull<MbNode<N>>) {
        node::delete(node.cast());
    }

    /// Links a whole-key entry and returns it, keeping duplicates in
    /// insertion order, or returns the incumbent in a unique tree.
    pub unsafe fn insert(&mut self, new: NonNull<MbNode<N>>) -> NonNull<MbNode<N>> {
        let root: *mut Root = &mut self.root;
        let new_ptr = new.as_ptr();
        let new_branches: NonNull<Root> = new.cast();
        let len = (N << 3) as i32;

        let mut side = LEFT;
        let mut troot = (*root).b[LEFT];
        let root_right = (*root).b[RGHT];

        if troot.is_none() {
            (*root).b[LEFT] = Link::new(new_branches, LEAF);
            (*new_ptr).node.leaf_p = Link::new(NonNull::new_unchecked(root), LEFT);
            (*new_ptr).node.node_p = Link::NONE;
            return new;
        }

        let mut bit: i32 = 0;
        let mut cur: *mut Root = root;
        let old: *mut MbNode<N>;
        let up_ptr: *mut Link;

        loop {
            if troot.tag() == LEAF {
                let o: *mut MbNode<N> = node::refer(troot).cast().as_ptr();
                (*new_ptr).node.node_p = (*o).node.leaf_p;
                up_ptr = &mut (*o).node.leaf_p;
                bit = equal_bits(&(*new_ptr).key, &(*o).key, bit, len);
                old = o;
                break;
            }

            let o: *mut MbNode<N> = node::refer(troot).cast().as_ptr();
            let old_bit = (*o).node.bit as i32;

            if old_bit < 0 {
                // a duplicate subtree always makes us insert above it
                (*new_ptr).node.node_p = (*o).node.node_p;
                up_ptr = &mut (*o).node.node_p;
                bit = equal_bits(&(*new_ptr).key, &(*o).key, bit, len);
                old = o;
                break;
            }

            bit = equal_bits(&(*new_ptr).key, &(*o).key, bit, old_bit);
            if bit < old_bit {
                // the keys part before this node's level
                (*new_ptr).node.node_p = (*o).node.node_p;
                up_ptr = &mut (*o).node.node_p;
                old = o;
                break;
            }

            // agreement may extend past this node, but the keys below only
            // guarantee its own count
            bit = old_bit;
            cur = &mut (*o).node.branches;
            side = get_bit(&(*new_ptr).key, old_bit as u32);
            troot = (*cur).b[side];
        }

        let new_left = Link::new(new_branches, LEFT);
        let new_rght = Link::new(new_branches, RGHT);
        let new_leaf = Link::new(new_branches, LEAF);

        let diff = if (bit >> 3) < N as i32 {
            cmp_bits(&(*new_ptr).key, &(*old).key, bit as u32)
        } else {
            0
        };

        if diff == 0 {
            (*new_ptr).node.bit = -1;
            if root_right.tag() == UNIQUE {
                return NonNull::new_unchecked(old);
            }
            if troot.tag() != LEAF {
                return node::insert_dup(NonNull::new_unchecked(old).cast(), new.cast()).cast();
            }
        } else {
            (*new_ptr).node.bit = bit as i16;
        }

        if diff >= 0 {
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

    /// The oldest entry with exactly this whole key.
    pub unsafe fn lookup(&self, x: &[u8; N]) -> Option<NonNull<MbNode<N>>> {
        let mut troot = self.root.b[LEFT];
        if troot.is_none() {
            return None;
        }
        let mut bit: i32 = 0;

        loop {
            if troot.tag() == LEAF {
                let n: NonNull<MbNode<N>> = node::refer(troot).cast();
                let from = (bit >> 3) as usize;
                if (&(*n.as_ptr()).key)[from..] == x[from..] {
                    return Some(n);
                }
                return None;
            }

            let n: NonNull<MbNode<N>> = node::refer(troot).cast();
            let node_bit = (*n.as_ptr()).node.bit as i32;

            if node_bit < 0 {
                // duplicate subtree: match or give up, whole value decides
                let from = (bit >> 3) as usize;
                if (&(*n.as_ptr()).key)[from..] != x[from..] {
                    return None;
                }
                return node::walk_down((*n.as_ptr()).node.branches.b[LEFT], LEFT)
                    .map(NonNull::cast);
            }

            let eq = equal_bits(x, &(*n.as_ptr()).key, bit, node_bit);
            if eq < node_bit {
                return None;
            }
            bit = node_bit;
            troot = (*n.as_ptr()).node.branches.b[get_bit(x, node_bit as u32)];
        }
    }

    /// Links a prefix entry built with [`MbNode::new_prefix`] and returns
    /// it, or the incumbent when a unique tree already holds the same
    /// (key, prefix) pair. Entries with the same pair keep insertion
    /// order. Never mix with [`MbTree::insert`] on one tree.
    pub unsafe fn insert_prefix(&mut self, new: NonNull<MbNode<N>>) -> NonNull<MbNode<N>> {
        let root: *mut Root = &mut self.root;
        let new_ptr = new.as_ptr();
        let new_branches: NonNull<Root> = new.cast();

        let mut side = LEFT;
        let mut troot = (*root).b[LEFT];
        let root_right = (*root).b[RGHT];

        if troot.is_none() {
            (*root).b[LEFT] = Link::new(new_branches, LEAF);
            (*new_ptr).node.leaf_p = Link::new(NonNull::new_unchecked(root), LEFT);
            (*new_ptr).node.node_p = Link::NONE;
            return new;
        }

        let q = (*new_ptr).node.pfx as i32;
        let mut bit: i32 = 0;
        let mut cur: *mut Root = root;
        let old: *mut MbNode<N>;
        let up_ptr: *mut Link;
        let diff: i32;
        let mut stored: i16 = -1;

        loop {
            if troot.tag() == LEAF {
                let o: *mut MbNode<N> = node::refer(troot).cast().as_ptr();
                (*new_ptr).node.node_p = (*o).node.leaf_p;
                up_ptr = &mut (*o).node.leaf_p;
                old = o;
                diff = classify(new_ptr, o, &mut bit, &mut stored, q);
                break;
            }

            let o: *mut MbNode<N> = node::refer(troot).cast().as_ptr();
            let ob = (*o).node.bit as i32;

            if ob < 0 {
                // duplicate subtree of one (key, prefix) pair
                (*new_ptr).node.node_p = (*o).node.node_p;
                up_ptr = &mut (*o).node.node_p;
                old = o;
                diff = classify(new_ptr, o, &mut bit, &mut stored, q);
                break;
            }

            let p = ob >> 1;
            bit = equal_bits(&(*new_ptr).key, &(*o).key, bit, p);

            if bit < p && bit < q {
                // the keys part before this node: ordinary split above it
                (*new_ptr).node.node_p = (*o).node.node_p;
                up_ptr = &mut (*o).node.node_p;
                old = o;
                diff = cmp_bits(&(*new_ptr).key, &(*o).key, bit as u32);
                stored = (2 * bit + 1) as i16;
                break;
            }

            if bit >= q && (q < p || (q == p && ob & 1 == 1)) {
                // our whole prefix matches and ends above this node, so the
                // new entry covers everything below it
                (*new_ptr).node.node_p = (*o).node.node_p;
                up_ptr = &mut (*o).node.node_p;
                old = o;
                diff = -1;
                stored = (2 * q) as i16;
                break;
            }

            if ob & 1 == 0 {
                // cover node: entries with this exact prefix length live on
                // the left, longer ones on the right
                cur = &mut (*o).node.branches;
                bit = p;
                side = if q == p { LEFT } else { RGHT };
                troot = (*cur).b[side];
                continue;
            }

            bit = p;
            cur = &mut (*o).node.branches;
            side = get_bit(&(*new_ptr).key, p as u32);
            troot = (*cur).b[side];
        }

        let new_left = Link::new(new_branches, LEFT);
        let new_rght = Link::new(new_branches, RGHT);
        let new_leaf = Link::new(new_branches, LEAF);

        if diff == 0 {
            (*new_ptr).node.bit = -1;
            if root_right.tag() == UNIQUE {
                return NonNull::new_unchecked(old);
            }
            if troot.tag() != LEAF {
                return node::insert_dup(NonNull::new_unchecked(old).cast(), new.cast()).cast();
            }
        } else {
            (*new_ptr).node.bit = stored;
        }

        if diff >= 0 {
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

    /// The entry whose prefix is the longest one matching `x`, oldest
    /// first among duplicates, in a tree built with
    /// [`MbTree::insert_prefix`].
    pub unsafe fn lookup_longest(&self, x: &[u8; N]) -> Option<NonNull<MbNode<N>>> {
        let mut troot = self.root.b[LEFT];
        if troot.is_none() {
            return None;
        }

        let mut cover = Link::NONE;
        let mut bit: i32 = 0;

        loop {
            if troot.tag() == LEAF {
                let n: NonNull<MbNode<N>> = node::refer(troot).cast();
                let pfx = (*n.as_ptr()).node.pfx as i32;
                if check_bits(x, &(*n.as_ptr()).key, (bit >> 3) as usize, pfx) {
                    return Some(n);
                }
                break;
            }

            let n: NonNull<MbNode<N>> = node::refer(troot).cast();
            let ob = (*n.as_ptr()).node.bit as i32;

            if ob < 0 {
                let pfx = (*n.as_ptr()).node.pfx as i32;
                if check_bits(x, &(*n.as_ptr()).key, (bit >> 3) as usize, pfx) {
                    return node::walk_down((*n.as_ptr()).node.branches.b[LEFT], LEFT)
                        .map(NonNull::cast);
                }
                break;
            }

            let p = ob >> 1;
            let eq = equal_bits(x, &(*n.as_ptr()).key, bit, p);
            if eq < p {
                break;
            }
            bit = p;

            if ob & 1 == 0 {
                // the left branch holds entries covering everything we may
                // still find deeper: remember it and keep digging
                cover = (*n.as_ptr()).node.branches.b[LEFT];
                troot = (*n.as_ptr()).node.branches.b[RGHT];
                continue;
            }
            troot = (*n.as_ptr()).node.branches.b[get_bit(x, p as u32)];
        }

        // no deeper match: fall back to the most specific cover passed
        if !cover.is_none() {
            return node::walk_down(cover, LEFT).map(NonNull::cast);
        }
        None
    }

    /// The oldest entry carrying exactly the (key, prefix) pair, in a tree
    /// built with [`MbTree::insert_prefix`].
    pub unsafe fn lookup_prefix(&self, x: &[u8; N], pfx: u16) -> Option<NonNull<MbNode<N>>> {
        let q = pfx as i32;
        let mut troot = self.root.b[LEFT];
        if troot.is_none() {
            return None;
        }
        let mut bit: i32 = 0;

        loop {
            if troot.tag() == LEAF {
                let n: NonNull<MbNode<N>> = node::refer(troot).cast();
                if (*n.as_ptr()).node.pfx as i32 == q
                    && check_bits(x, &(*n.as_ptr()).key, (bit >> 3) as usize, q)
                {
                    return Some(n);
                }
                return None;
            }

            let n: NonNull<MbNode<N>> = node::refer(troot).cast();
            let ob = (*n.as_ptr()).node.bit as i32;

            if ob < 0 {
                if (*n.as_ptr()).node.pfx as i32 == q
                    && check_bits(x, &(*n.as_ptr()).key, (bit >> 3) as usize, q)
                {
                    return node::walk_down((*n.as_ptr()).node.branches.b[LEFT], LEFT)
                        .map(NonNull::cast);
                }
                return None;
            }

            let p = ob >> 1;

            if ob & 1 == 0 {
                // prefixes shorter than this cover would have been found
                // higher up
                if q < p {
                    return None;
                }
                let eq = equal_bits(x, &(*n.as_ptr()).key, bit, p);
                if eq < p {
                    return None;
                }
                bit = p;
                troot = if q == p {
                    (*n.as_ptr()).node.branches.b[LEFT]
                } else {
                    (*n.as_ptr()).node.branches.b[RGHT]
                };
                continue;
            }

            // an ordinary split at p implies every entry below reaches
            // past p
            if q <= p {
                return None;
            }
            let eq = equal_bits(x, &(*n.as_ptr()).key, bit, p);
            if eq < p {
                return None;
            }
            bit = p;
            troot = (*n.as_ptr()).node.branches.b[get_bit(x, p as u32)];
        }
    }

    pub unsafe fn stats(&self) -> TreeStats {
        TreeStats::collect(&self.root)
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> &Root {
        &self.root
    }
}

/// Relation of a new prefix entry to the leaf or duplicate subtree found
/// at the end of the descent: 0 for the same (key, prefix) pair, the
/// ordering sign otherwise, with `stored` receiving the branch value for
/// the node to build.
unsafe fn classify<const N: usize>(
    new: *mut MbNode<N>,
    old: *mut MbNode<N>,
    bit: &mut i32,
    stored: &mut i16,
    q: i32,
) -> i32 {
    let op = (*old).node.pfx as i32;
    let np = q.min(op);
    *bit = equal_bits(&(*new).key, &(*old).key, *bit, np);
    if *bit >= np {
        if q == op {
            return 0;
        }
        if q < op {
            // the new, shorter prefix covers the old entry
            *stored = (2 * q) as i16;
            return -1;
        }
        // the old entry covers the new one
        *stored = (2 * op) as i16;
        return 1;
    }
    *stored = (2 * *bit + 1) as i16;
    cmp_bits(&(*new).key, &(*old).key, *bit as u32)
}
