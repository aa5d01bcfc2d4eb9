//! Trees whose byte keys live outside the node.
//!
//! Both flavors store only a pointer in a [`PtrNode`] and dereference it
//! during comparisons: [`ImTree`] for fixed-length byte blocks whose
//! length is passed per operation, [`IsTree`] for NUL-terminated strings.
//! The pointed-to bytes must stay valid and unchanged for as long as the
//! node is linked.

use core::ffi::{c_char, CStr};
use core::ptr::NonNull;
use core::slice;

use crate::bits::{cmp_bits, equal_bits, get_bit, string_equal_bits};
use crate::link::{Link, Root, INNER, LEAF, LEFT, RGHT, UNIQUE};
use crate::node;
use crate::ptr::PtrNode;
use crate::stats::TreeStats;

/// The block of `len` bytes a node's key points at.
unsafe fn block<'a>(n: *const PtrNode, len: usize) -> &'a [u8] {
    slice::from_raw_parts((*n).key as *const u8, len)
}

/// The NUL-terminated bytes a node's key points at, terminator included.
unsafe fn string<'a>(n: *const PtrNode) -> &'a [u8] {
    CStr::from_ptr((*n).key as *const c_char).to_bytes_with_nul()
}

macro_rules! shared_surface {
    () => {
        pub fn is_empty(&self) -> bool {
            self.root.is_empty()
        }

        pub fn is_unique(&self) -> bool {
            self.root.is_unique()
        }

        pub unsafe fn first(&self) -> Option<NonNull<PtrNode>> {
            node::first(&self.root).map(NonNull::cast)
        }

        pub unsafe fn last(&self) -> Option<NonNull<PtrNode>> {
            node::last(&self.root).map(NonNull::cast)
        }

        pub unsafe fn next(&self, node: NonNull<PtrNode>) -> Option<NonNull<PtrNode>> {
            node::next(node.cast()).map(NonNull::cast)
        }

        pub unsafe fn prev(&self, node: NonNull<PtrNode>) -> Option<NonNull<PtrNode>> {
            node::prev(node.cast()).map(NonNull::cast)
        }

        pub unsafe fn next_unique(&self, node: NonNull<PtrNode>) -> Option<NonNull<PtrNode>> {
            node::next_unique(node.cast()).map(NonNull::cast)
        }

        pub unsafe fn prev_unique(&self, node: NonNull<PtrNode>) -> Option<NonNull<PtrNode>> {
            node::prev_unique(node.cast()).map(NonNull::cast)
        }

        /// Unlinks `node`; idempotent on unlinked nodes.
        pub unsafe fn delete(&mut self, node: NonNull<PtrNode>) {
            node::delete(node.cast());
        }

        pub unsafe fn stats(&self) -> TreeStats {
            TreeStats::collect(&self.root)
        }
    };
}

/// An elastic binary tree over fixed-length byte keys held by pointer.
///
/// Every operation on one tree must use the same length. Same ownership
/// and pinning contract as [`crate::IntTree`].
pub struct ImTree {
    root: Root,
}

impl Default for ImTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ImTree {
    pub const fn new() -> Self {
        ImTree { root: Root::new() }
    }

    pub const fn new_unique() -> Self {
        ImTree {
            root: Root::new_unique(),
        }
    }

    shared_surface!();

    /// Links `new`, whose key must point at `len` stable bytes, and
    /// returns it, or returns the incumbent in a unique tree.
    pub unsafe fn insert(&mut self, new: NonNull<PtrNode>, len: usize) -> NonNull<PtrNode> {
        let root: *mut Root = &mut self.root;
        let new_ptr = new.as_ptr();
        let new_branches: NonNull<Root> = new.cast();
        let len_bits = (len << 3) as i32;

        let mut side = LEFT;
        let mut troot = (*root).b[LEFT];
        let root_right = (*root).b[RGHT];

        if troot.is_none() {
            (*root).b[LEFT] = Link::new(new_branches, LEAF);
            (*new_ptr).node.leaf_p = Link::new(NonNull::new_unchecked(root), LEFT);
            (*new_ptr).node.node_p = Link::NONE;
            return new;
        }

        let newkey = block(new_ptr, len);
        let mut bit: i32 = 0;
        let mut cur: *mut Root = root;
        let old: *mut PtrNode;
        let up_ptr: *mut Link;

        loop {
            if troot.tag() == LEAF {
                let o: *mut PtrNode = node::refer(troot).cast().as_ptr();
                (*new_ptr).node.node_p = (*o).node.leaf_p;
                up_ptr = &mut (*o).node.leaf_p;
                bit = equal_bits(newkey, block(o, len), bit, len_bits);
                old = o;
                break;
            }

            let o: *mut PtrNode = node::refer(troot).cast().as_ptr();
            let old_bit = (*o).node.bit as i32;

            if old_bit < 0 {
                (*new_ptr).node.node_p = (*o).node.node_p;
                up_ptr = &mut (*o).node.node_p;
                bit = equal_bits(newkey, block(o, len), bit, len_bits);
                old = o;
                break;
            }

            bit = equal_bits(newkey, block(o, len), bit, old_bit);
            if bit < old_bit {
                (*new_ptr).node.node_p = (*o).node.node_p;
                up_ptr = &mut (*o).node.node_p;
                old = o;
                break;
            }

            bit = old_bit;
            cur = &mut (*o).node.branches;
            side = get_bit(newkey, old_bit as u32);
            troot = (*cur).b[side];
        }

        let new_left = Link::new(new_branches, LEFT);
        let new_rght = Link::new(new_branches, RGHT);
        let new_leaf = Link::new(new_branches, LEAF);

        let diff = if (bit >> 3) < len as i32 {
            cmp_bits(newkey, block(old, len), bit as u32)
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

    /// The oldest entry whose `x.len()` key bytes equal `x`.
    pub unsafe fn lookup(&self, x: &[u8]) -> Option<NonNull<PtrNode>> {
        let len = x.len();
        let mut troot = self.root.b[LEFT];
        if troot.is_none() {
            return None;
        }
        let mut bit: i32 = 0;

        loop {
            if troot.tag() == LEAF {
                let n: NonNull<PtrNode> = node::refer(troot).cast();
                let from = (bit >> 3) as usize;
                if block(n.as_ptr(), len)[from..] == x[from..] {
                    return Some(n);
                }
                return None;
            }

            let n: NonNull<PtrNode> = node::refer(troot).cast();
            let node_bit = (*n.as_ptr()).node.bit as i32;

            if node_bit < 0 {
                let from = (bit >> 3) as usize;
                if block(n.as_ptr(), len)[from..] != x[from..] {
                    return None;
                }
                return node::walk_down((*n.as_ptr()).node.branches.b[LEFT], LEFT)
                    .map(NonNull::cast);
            }

            let eq = equal_bits(x, block(n.as_ptr(), len), bit, node_bit);
            if eq < node_bit {
                return None;
            }
            bit = node_bit;
            troot = (*n.as_ptr()).node.branches.b[get_bit(x, node_bit as u32)];
        }
    }
}

/// An elastic binary tree over NUL-terminated string keys held by
/// pointer.
///
/// Same ownership and pinning contract as [`crate::IntTree`].
pub struct IsTree {
    root: Root,
}

impl Default for IsTree {
    fn default() -> Self {
        Self::new()
    }
}

impl IsTree {
    pub const fn new() -> Self {
        IsTree { root: Root::new() }
    }

    pub const fn new_unique() -> Self {
        IsTree {
            root: Root::new_unique(),
        }
    }

    shared_surface!();

    /// Links `new`, whose key must point at a stable NUL-terminated
    /// string, and returns it, or returns the incumbent in a unique tree.
    pub unsafe fn insert(&mut self, new: NonNull<PtrNode>) -> NonNull<PtrNode> {
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

        let newkey = string(new_ptr);
        let mut bit: i32 = 0;
        let mut cur: *mut Root = root;
        let old: *mut PtrNode;
        let up_ptr: *mut Link;

        loop {
            if troot.tag() == LEAF {
                let o: *mut PtrNode = node::refer(troot).cast().as_ptr();
                (*new_ptr).node.node_p = (*o).node.leaf_p;
                up_ptr = &mut (*o).node.leaf_p;
                bit = string_equal_bits(newkey, string(o), bit);
                old = o;
                break;
            }

            let o: *mut PtrNode = node::refer(troot).cast().as_ptr();
            let old_bit = (*o).node.bit as i32;

            if old_bit < 0 {
                (*new_ptr).node.node_p = (*o).node.node_p;
                up_ptr = &mut (*o).node.node_p;
                bit = string_equal_bits(newkey, string(o), bit);
                old = o;
                break;
            }

            let eq = string_equal_bits(newkey, string(o), bit);
            if eq >= 0 && eq < old_bit {
                (*new_ptr).node.node_p = (*o).node.node_p;
                up_ptr = &mut (*o).node.node_p;
                bit = eq;
                old = o;
                break;
            }

            bit = old_bit;
            cur = &mut (*o).node.branches;
            side = get_bit(newkey, old_bit as u32);
            troot = (*cur).b[side];
        }

        let new_left = Link::new(new_branches, LEFT);
        let new_rght = Link::new(new_branches, RGHT);
        let new_leaf = Link::new(new_branches, LEAF);

        let diff = if bit < 0 {
            0
        } else {
            cmp_bits(newkey, string(old), bit as u32)
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
    pub unsafe fn lookup(&self, x: &CStr) -> Option<NonNull<PtrNode>> {
        let xb = x.to_bytes_with_nul();
        let mut troot = self.root.b[LEFT];
        if troot.is_none() {
            return None;
        }
        let mut bit: i32 = 0;

        loop {
            if troot.tag() == LEAF {
                let n: NonNull<PtrNode> = node::refer(troot).cast();
                if string_equal_bits(xb, string(n.as_ptr()), bit) < 0 {
                    return Some(n);
                }
                return None;
            }

            let n: NonNull<PtrNode> = node::refer(troot).cast();
            let node_bit = (*n.as_ptr()).node.bit as i32;

            if node_bit < 0 {
                if string_equal_bits(xb, string(n.as_ptr()), bit) < 0 {
                    return node::walk_down((*n.as_ptr()).node.branches.b[LEFT], LEFT)
                        .map(NonNull::cast);
                }
                return None;
            }

            let eq = string_equal_bits(xb, string(n.as_ptr()), bit);
            if eq >= 0 && eq < node_bit {
                return None;
            }
            bit = node_bit;
            troot = (*n.as_ptr()).node.branches.b[get_bit(xb, node_bit as u32)];
        }
    }
}
