//! NUL-terminated string trees with the key stored inline.
//!
//! Keys compare byte-lexicographically and equal strings form duplicate
//! subtrees just like equal integers. The terminating NUL takes part in
//! the comparison, which is what keeps a string sorted before its own
//! extensions.

use core::ffi::CStr;
use core::ptr::NonNull;

use crate::bits::{cmp_bits, get_bit, string_equal_bits};
use crate::link::{Link, Root, INNER, LEAF, LEFT, RGHT, UNIQUE};
use crate::node::{self, Node};
use crate::stats::TreeStats;

/// A tree node holding a NUL-terminated string of at most `N - 1` bytes
/// inline.
#[repr(C)]
pub struct StrNode<const N: usize> {
    pub(crate) node: Node,
    pub(crate) key: [u8; N],
}

impl<const N: usize> StrNode<N> {
    /// A fresh unlinked node. The array must contain a NUL terminator.
    pub fn new(key: [u8; N]) -> Self {
        assert!(key.contains(&0), "string keys need a NUL terminator");
        StrNode {
            node: Node::new(),
            key,
        }
    }

    /// Builds the key from a string slice, NUL-padding the remainder.
    /// Panics when the slice leaves no room for the terminator or embeds
    /// a NUL of its own.
    pub fn from_str(s: &str) -> Self {
        assert!(s.len() < N, "string key does not fit");
        assert!(!s.as_bytes().contains(&0), "embedded NUL in string key");
        let mut key = [0u8; N];
        key[..s.len()].copy_from_slice(s.as_bytes());
        StrNode {
            node: Node::new(),
            key,
        }
    }

    pub fn key(&self) -> &CStr {
        // constructors refuse keys without a terminator
        CStr::from_bytes_until_nul(&self.key).unwrap()
    }

    /// True while the node is linked in a tree.
    pub fn in_tree(&self) -> bool {
        self.node.in_tree()
    }
}

/// An elastic binary tree over inline NUL-terminated string keys.
///
/// Same ownership and pinning contract as [`crate::IntTree`].
pub struct StrTree<const N: usize> {
    root: Root,
}

impl<const N: usize> Default for StrTree<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> StrTree<N> {
    pub const fn new() -> Self {
        StrTree { root: Root::new() }
    }

    pub const fn new_unique() -> Self {
        StrTree {
            root: Root::new_unique(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn is_unique(&self) -> bool {
        self.root.is_unique()
    }

    pub unsafe fn first(&self) -> Option<NonNull<StrNode<N>>> {
        node::first(&self.root).map(NonNull::cast)
    }

    pub unsafe fn last(&self) -> Option<NonNull<StrNode<N>>> {
        node::last(&self.root).map(NonNull::cast)
    }

    pub unsafe fn next(&self, node: NonNull<StrNode<N>>) -> Option<NonNull<StrNode<N>>> {
        node::next(node.cast()).map(NonNull::cast)
    }

    pub unsafe fn prev(&self, node: NonNull<StrNode<N>>) -> Option<NonNull<StrNode<N>>> {
        node::prev(node.cast()).map(NonNull::cast)
    }

    pub unsafe fn next_unique(&self, node: NonNull<StrNode<N>>) -> Option<NonNull<StrNode<N>>> {
        node::next_unique(node.cast()).map(NonNull::cast)
    }

    pub unsafe fn prev_unique(&self, node: NonNull<StrNode<N>>) -> Option<NonNull<StrNode<N>>> {
        node::prev_unique(node.cast()).map(NonNull::cast)
    }

    /// Unlinks `node`; idempotent on unlinked nodes.
    pub unsafe fn delete(&mut self, node: NonNull<StrNode<N>>) {
        node::delete(node.cast());
    }

    /// Links `new` and returns it, keeping equal strings in insertion
    /// order, or returns the incumbent in a unique tree.
    pub unsafe fn insert(&mut self, new: NonNull<StrNode<N>>) -> NonNull<StrNode<N>> {
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

        let mut bit: i32 = 0;
        let mut cur: *mut Root = root;
        let old: *mut StrNode<N>;
        let up_ptr: *mut Link;

        loop {
            if troot.tag() == LEAF {
                let o: *mut StrNode<N> = node::refer(troot).cast().as_ptr();
                (*new_ptr).node.node_p = (*o).node.leaf_p;
                up_ptr = &mut (*o).node.leaf_p;
                bit = string_equal_bits(&(*new_ptr).key, &(*o).key, bit);
                old = o;
                break;
            }

            let o: *mut StrNode<N> = node::refer(troot).cast().as_ptr();
            let old_bit = (*o).node.bit as i32;

            if old_bit < 0 {
                (*new_ptr).node.node_p = (*o).node.node_p;
                up_ptr = &mut (*o).node.node_p;
                bit = string_equal_bits(&(*new_ptr).key, &(*o).key, bit);
                old = o;
                break;
            }

            let eq = string_equal_bits(&(*new_ptr).key, &(*o).key, bit);
            if eq >= 0 && eq < old_bit {
                // the strings part before this node's level
                (*new_ptr).node.node_p = (*o).node.node_p;
                up_ptr = &mut (*o).node.node_p;
                bit = eq;
                old = o;
                break;
            }

            // equal so far, or agreeing past this node: keep descending.
            // Only the node's own count is guaranteed for the keys below.
            bit = old_bit;
            cur = &mut (*o).node.branches;
            side = get_bit(&(*new_ptr).key, old_bit as u32);
            troot = (*cur).b[side];
        }

        let new_left = Link::new(new_branches, LEFT);
        let new_rght = Link::new(new_branches, RGHT);
        let new_leaf = Link::new(new_branches, LEAF);

        // a negative count means both strings terminated together
        let diff = if bit < 0 {
            0
        } else {
            cmp_bits(&(*new_ptr).key, &(*old).key, bit as u32)
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

    /// The oldest entry holding exactly this string.
    pub unsafe fn lookup(&self, x: &CStr) -> Option<NonNull<StrNode<N>>> {
        let xb = x.to_bytes_with_nul();
        let mut troot = self.root.b[LEFT];
        if troot.is_none() {
            return None;
        }
        let mut bit: i32 = 0;

        loop {
            if troot.tag() == LEAF {
                let n: NonNull<StrNode<N>> = node::refer(troot).cast();
                if string_equal_bits(xb, &(*n.as_ptr()).key, bit) < 0 {
                    return Some(n);
                }
                return None;
            }

            let n: NonNull<StrNode<N>> = node::refer(troot).cast();
            let node_bit = (*n.as_ptr()).node.bit as i32;

            if node_bit < 0 {
                if string_equal_bits(xb, &(*n.as_ptr()).key, bit) < 0 {
                    return node::walk_down((*n.as_ptr()).node.branches.b[LEFT], LEFT)
                        .map(NonNull::cast);
                }
                return None;
            }

            let eq = string_equal_bits(xb, &(*n.as_ptr()).key, bit);
            if eq >= 0 && eq < node_bit {
                return None;
            }
            bit = node_bit;
            troot = (*n.as_ptr()).node.branches.b[get_bit(xb, node_bit as u32)];
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
