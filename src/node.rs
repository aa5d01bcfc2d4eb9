//! The type-agnostic tree skeleton.
//!
//! Every stored entity embeds one [`Node`]. A node plays two roles at
//! once: its branch pair can serve as an inner branching point somewhere in
//! the tree, and the entity itself is a leaf somewhere below that point.
//! The two parent links record where each role is attached. The first
//! entity inserted in a tree uses only its leaf role, which is why a tree
//! of N entries never needs more than N nodes.
//!
//! Traversal and deletion only ever look at links and at the sign of the
//! branch bit, so they are shared verbatim by every key flavor.

use core::ptr::NonNull;

use crate::link::{Link, Root, INNER, LEAF, LEFT, RGHT};

/// The generic header of every tree node.
///
/// The branch pair must stay the first field: links address the pair, and
/// recovering the owning node from a link is a cast.
#[repr(C)]
pub(crate) struct Node {
    pub(crate) branches: Root,
    /// Where the inner role hangs, tagged with its side. None while the
    /// node is the shallowest leaf of its tree.
    pub(crate) node_p: Link,
    /// Where the leaf role hangs, tagged with its side. None while the
    /// node is not linked in any tree.
    pub(crate) leaf_p: Link,
    /// Ordinary inner nodes keep the key bit (integer trees) or the count
    /// of shared leading bits (byte trees) that selects their children.
    /// Negative values mark duplicate-subtree nodes.
    pub(crate) bit: i16,
    /// Prefix length in bits, used only by prefix-matching byte trees.
    pub(crate) pfx: u16,
}

impl Node {
    pub(crate) const fn new() -> Node {
        Node {
            branches: Root::new(),
            node_p: Link::NONE,
            leaf_p: Link::NONE,
            bit: 0,
            pfx: 0,
        }
    }

    /// A node is linked in a tree exactly when its leaf role is attached.
    pub(crate) fn in_tree(&self) -> bool {
        !self.leaf_p.is_none()
    }
}

/// The node owning the branch pair referenced by a non-none link.
#[inline]
pub(crate) unsafe fn refer(link: Link) -> NonNull<Node> {
    NonNull::new_unchecked(link.ptr()).cast()
}

/// Descends from `start`, always taking `side`, down to the first leaf.
pub(crate) unsafe fn walk_down(start: Link, side: usize) -> Option<NonNull<Node>> {
    if start.is_none() {
        return None;
    }
    let mut cur = start;
    while cur.tag() == INNER {
        cur = (*cur.ptr()).b[side];
    }
    Some(refer(cur))
}

pub(crate) unsafe fn first(root: &Root) -> Option<NonNull<Node>> {
    walk_down(root.b[LEFT], LEFT)
}

pub(crate) unsafe fn last(root: &Root) -> Option<NonNull<Node>> {
    walk_down(root.b[LEFT], RGHT)
}

/// Next leaf in ascending key order; duplicates come in insertion order.
pub(crate) unsafe fn next(node: NonNull<Node>) -> Option<NonNull<Node>> {
    let mut t = (*node.as_ptr()).leaf_p;
    while t.tag() == RGHT {
        // climbing out of a right branch cannot cross the top
        t = (*refer(t).as_ptr()).node_p;
    }
    let down = (*t.ptr()).b[RGHT];
    if down.is_none() {
        return None;
    }
    walk_down(down, LEFT)
}

/// Previous leaf; duplicates come in reverse insertion order.
pub(crate) unsafe fn prev(node: NonNull<Node>) -> Option<NonNull<Node>> {
    let mut t = (*node.as_ptr()).leaf_p;
    while t.tag() == LEFT {
        if (*t.ptr()).b[RGHT].is_none() {
            // only the top has a bare right slot
            return None;
        }
        t = (*refer(t).as_ptr()).node_p;
    }
    walk_down((*t.ptr()).b[LEFT], RGHT)
}

/// Next leaf carrying a different key: whole duplicate subtrees are
/// climbed out of before stepping right.
pub(crate) unsafe fn next_unique(node: NonNull<Node>) -> Option<NonNull<Node>> {
    let mut t = (*node.as_ptr()).leaf_p;
    loop {
        if t.tag() == LEFT {
            if (*t.ptr()).b[RGHT].is_none() {
                return None;
            }
            let n = refer(t);
            if (*n.as_ptr()).bit >= 0 {
                break;
            }
            t = (*n.as_ptr()).node_p;
        } else {
            t = (*refer(t).as_ptr()).node_p;
        }
    }
    let down = (*t.ptr()).b[RGHT];
    if down.is_none() {
        return None;
    }
    walk_down(down, LEFT)
}

/// Previous leaf carrying a different key.
pub(crate) unsafe fn prev_unique(node: NonNull<Node>) -> Option<NonNull<Node>> {
    let mut t = (*node.as_ptr()).leaf_p;
    loop {
        if t.tag() != LEFT {
            let n = refer(t);
            if (*n.as_ptr()).bit >= 0 {
                break;
            }
            t = (*n.as_ptr()).node_p;
        } else {
            if (*t.ptr()).b[RGHT].is_none() {
                return None;
            }
            t = (*refer(t).as_ptr()).node_p;
        }
    }
    walk_down((*t.ptr()).b[LEFT], RGHT)
}

/// Unlinks a leaf and, when its inner role was in use, recycles the freed
/// parent in its place. Touches a constant number of links whatever the
/// population. Calling it again on an unlinked node does nothing.
pub(crate) unsafe fn delete(node: NonNull<Node>) {
    let node = node.as_ptr();
    let leaf_p = (*node).leaf_p;
    if leaf_p.is_none() {
        return;
    }

    let pside = leaf_p.tag();
    let parent = leaf_p.ptr();

    // A parent with a bare right slot is the top of the tree: the leaf
    // was alone in it.
    if (*parent).b[RGHT].is_none() {
        (*parent).b[LEFT] = Link::NONE;
        (*node).leaf_p = Link::NONE;
        return;
    }

    // Reattach our sibling under the grandparent; this frees the parent
    // node's inner role.
    let parent_node = refer(leaf_p).as_ptr();
    let gp = (*parent_node).node_p;
    let gparent = gp.ptr();
    let gpside = gp.tag();

    let sib = (*parent).b[pside ^ 1];
    (*gparent).b[gpside] = sib;
    let sib_node = refer(sib).as_ptr();
    if sib.tag() == LEAF {
        (*sib_node).leaf_p = Link::new(NonNull::new_unchecked(gparent), gpside);
    } else {
        (*sib_node).node_p = Link::new(NonNull::new_unchecked(gparent), gpside);
    }
    // When the parent is our own node part, this also clears node_p and
    // the next test exits directly.
    (*parent_node).node_p = Link::NONE;

    if (*node).node_p.is_none() {
        (*node).leaf_p = Link::NONE;
        return;
    }

    // Our inner role is still wired somewhere above: the freed parent
    // takes it over. Its key sits below ours in the same subtree, so it
    // divides the branches the same way.
    (*parent_node).node_p = (*node).node_p;
    (*parent_node).branches.b = (*node).branches.b;
    (*parent_node).bit = (*node).bit;

    let up = (*parent_node).node_p;
    let pb = NonNull::new_unchecked(&mut (*parent_node).branches as *mut Root);
    (*up.ptr()).b[up.tag()] = Link::new(pb, INNER);

    for side in [LEFT, RGHT] {
        let b = (*parent_node).branches.b[side];
        let child = refer(b).as_ptr();
        if b.tag() == INNER {
            (*child).node_p = Link::new(pb, side);
        } else {
            (*child).leaf_p = Link::new(pb, side);
        }
    }

    (*node).leaf_p = Link::NONE;
}

/// Grows the duplicate subtree rooted at `sub` with `new`, so that an
/// in-order walk keeps returning entries in insertion order. The new node
/// goes into the deepest hole of the negative bit sequence found along the
/// right spine, or above the spine when the sequence is dense.
pub(crate) unsafe fn insert_dup(sub: NonNull<Node>, new: NonNull<Node>) -> NonNull<Node> {
    let mut sub = sub.as_ptr();
    let mut head = sub;

    let new_branches: NonNull<Root> = new.cast();
    let new_left = Link::new(new_branches, LEFT);
    let new_rght = Link::new(new_branches, RGHT);
    let new_leaf = Link::new(new_branches, LEAF);
    let new = new.as_ptr();

    while (*head).branches.b[RGHT].tag() == INNER {
        let last = head;
        head = refer((*head).branches.b[RGHT]).as_ptr();
        if (*head).bit > (*last).bit + 1 {
            // the bit sequence skips a level here
            sub = head;
        }
    }

    if (*head).bit < -1 {
        // room left just above the rightmost leaf
        (*new).bit = -1;
        let leaf = refer((*head).branches.b[RGHT]).as_ptr();
        (*head).branches.b[RGHT] = Link::new(new_branches, INNER);

        (*new).node_p = (*leaf).leaf_p;
        (*new).leaf_p = new_rght;
        (*leaf).leaf_p = new_left;
        (*new).branches.b[LEFT] = Link::new(
            NonNull::new_unchecked(&mut (*leaf).branches as *mut Root),
            LEAF,
        );
        (*new).branches.b[RGHT] = new_leaf;
    } else {
        // no room before the leaf: open a level above <sub>, which is
        // either the spine head or the deepest hole found
        (*new).bit = (*sub).bit - 1;
        let up = (*sub).node_p;
        (*up.ptr()).b[up.tag()] = Link::new(new_branches, INNER);

        (*new).node_p = up;
        (*new).leaf_p = new_rght;
        (*sub).node_p = new_left;
        (*new).branches.b[LEFT] = Link::new(
            NonNull::new_unchecked(&mut (*sub).branches as *mut Root),
            INNER,
        );
        (*new).branches.b[RGHT] = new_leaf;
    }
    NonNull::new_unchecked(new)
}
