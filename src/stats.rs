//! Tree shape reporting.

use core::ptr::NonNull;
use std::fmt::{self, Display};

use crate::link::{Root, RGHT};
use crate::node::{self, Node};

/// Shape and population figures for one tree, gathered by full ordered
/// walks. Meant for dumps and test assertions, not for hot paths; the
/// collection itself allocates nothing.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
pub struct TreeStats {
    /// Stored entries, duplicates included.
    pub leaves: usize,
    /// Distinct keys.
    pub unique_keys: usize,
    /// Entries sharing their key with an earlier entry.
    pub duplicates: usize,
    /// Inner levels above the deepest entry.
    pub max_depth: usize,
    /// Mean number of inner levels above an entry.
    pub avg_depth: f64,
}

impl TreeStats {
    pub(crate) unsafe fn collect(root: &Root) -> TreeStats {
        let mut stats = TreeStats::default();
        let mut total_depth = 0usize;

        let mut cur = node::first(root);
        while let Some(n) = cur {
            stats.leaves += 1;
            let depth = leaf_depth(n);
            total_depth += depth;
            stats.max_depth = stats.max_depth.max(depth);
            cur = node::next(n);
        }

        let mut cur = node::first(root);
        while let Some(n) = cur {
            stats.unique_keys += 1;
            cur = node::next_unique(n);
        }

        stats.duplicates = stats.leaves - stats.unique_keys;
        if stats.leaves > 0 {
            stats.avg_depth = total_depth as f64 / stats.leaves as f64;
        }
        stats
    }
}

unsafe fn leaf_depth(node: NonNull<Node>) -> usize {
    let mut depth = 0;
    let mut t = (*node.as_ptr()).leaf_p;
    // the top of the tree is the only branch pair with a bare right slot
    while !(*t.ptr()).b[RGHT].is_none() {
        depth += 1;
        t = (*node::refer(t).as_ptr()).node_p;
    }
    depth
}

impl Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "leaves: {:8} || unique: {:8} || dups: {:8} || depth max: {:4}, avg: {:6.2}",
            self.leaves, self.unique_keys, self.duplicates, self.max_depth, self.avg_depth,
        )
    }
}
