//! Pointer-keyed tree, a thin view over the pointer-width integer tree.
//!
//! The key is an address and nothing more: the integer machinery orders
//! the tree by pointer value and never reads through it. The indirect
//! byte and string trees reuse [`PtrNode`] and do dereference the key,
//! with their own comparison routines.

use core::ptr::NonNull;

use crate::int::{IntNode, IntTree};
use crate::node::Node;
use crate::stats::TreeStats;

/// A tree node keyed by a pointer value.
#[repr(C)]
pub struct PtrNode {
    pub(crate) node: Node,
    pub(crate) key: *const (),
}

// PtrNode lays out exactly like IntNode<usize>: same header, one word of
// key. The integer operations read that word as an address-sized integer,
// which is all the ordering needs.
#[inline]
fn as_int(n: NonNull<PtrNode>) -> NonNull<IntNode<usize>> {
    n.cast()
}

impl PtrNode {
    /// A fresh unlinked node keyed by `key`.
    pub const fn new(key: *const ()) -> Self {
        PtrNode {
            node: Node::new(),
            key,
        }
    }

    pub fn key(&self) -> *const () {
        self.key
    }

    /// True while the node is linked in a tree.
    pub fn in_tree(&self) -> bool {
        self.node.in_tree()
    }
}

/// An elastic binary tree ordered by pointer value.
///
/// Same ownership and pinning contract as [`IntTree`].
pub struct PtrTree {
    inner: IntTree<usize>,
}

impl Default for PtrTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PtrTree {
    pub const fn new() -> Self {
        PtrTree {
            inner: IntTree::new(),
        }
    }

    pub const fn new_unique() -> Self {
        PtrTree {
            inner: IntTree::new_unique(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_unique(&self) -> bool {
        self.inner.is_unique()
    }

    pub unsafe fn first(&self) -> Option<NonNull<PtrNode>> {
        self.inner.first().map(NonNull::cast)
    }

    pub unsafe fn last(&self) -> Option<NonNull<PtrNode>> {
        self.inner.last().map(NonNull::cast)
    }

    pub unsafe fn next(&self, node: NonNull<PtrNode>) -> Option<NonNull<PtrNode>> {
        self.inner.next(as_int(node)).map(NonNull::cast)
    }

    pub unsafe fn prev(&self, node: NonNull<PtrNode>) -> Option<NonNull<PtrNode>> {
        self.inner.prev(as_int(node)).map(NonNull::cast)
    }

    pub unsafe fn next_unique(&self, node: NonNull<PtrNode>) -> Option<NonNull<PtrNode>> {
        self.inner.next_unique(as_int(node)).map(NonNull::cast)
    }

    pub unsafe fn prev_unique(&self, node: NonNull<PtrNode>) -> Option<NonNull<PtrNode>> {
        self.inner.prev_unique(as_int(node)).map(NonNull::cast)
    }

    /// Unlinks `node`; idempotent on unlinked nodes.
    pub unsafe fn delete(&mut self, node: NonNull<PtrNode>) {
        self.inner.delete(as_int(node));
    }

    /// Links `new` and returns it, or returns the incumbent for an equal
    /// key in a unique tree.
    pub unsafe fn insert(&mut self, new: NonNull<PtrNode>) -> NonNull<PtrNode> {
        self.inner.insert(as_int(new)).cast()
    }

    /// The oldest entry keyed by exactly this address.
    pub unsafe fn lookup(&self, key: *const ()) -> Option<NonNull<PtrNode>> {
        self.inner.lookup(key as usize).map(NonNull::cast)
    }

    /// The last entry keyed at or below this address.
    pub unsafe fn lookup_le(&self, key: *const ()) -> Option<NonNull<PtrNode>> {
        self.inner.lookup_le(key as usize).map(NonNull::cast)
    }

    /// The first entry keyed at or above this address.
    pub unsafe fn lookup_ge(&self, key: *const ()) -> Option<NonNull<PtrNode>> {
        self.inner.lookup_ge(key as usize).map(NonNull::cast)
    }

    pub unsafe fn stats(&self) -> TreeStats {
        self.inner.stats()
    }
}
