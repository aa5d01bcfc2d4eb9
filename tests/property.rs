//! Model tests: random operation sequences against the standard ordered
//! map, with duplicate counts tracked on the side.

use std::collections::BTreeMap;
use std::ptr::NonNull;

use proptest::prelude::*;

use ebtree::{Node64, Tree64};

#[derive(Debug, Clone)]
enum Op {
    Insert(u64),
    Delete(u64),
    Lookup(u64),
    Floor(u64),
    Ceil(u64),
}

fn op() -> impl Strategy<Value = Op> {
    // a narrow key space provokes collisions and duplicate subtrees
    prop_oneof![
        3 => (0u64..96).prop_map(Op::Insert),
        2 => (0u64..96).prop_map(Op::Delete),
        1 => (0u64..96).prop_map(Op::Lookup),
        1 => (0u64..128).prop_map(Op::Floor),
        1 => (0u64..128).prop_map(Op::Ceil),
    ]
}

proptest! {
    #[test]
    fn behaves_like_an_ordered_multimap(ops in proptest::collection::vec(op(), 1..300)) {
        let mut tree = Box::new(Tree64::new());
        let mut model: BTreeMap<u64, usize> = BTreeMap::new();
        let mut live: Vec<NonNull<Node64>> = Vec::new();

        unsafe {
            for op in ops {
                match op {
                    Op::Insert(k) => {
                        let n = NonNull::from(Box::leak(Box::new(Node64::new(k))));
                        let ret = tree.insert(n);
                        prop_assert_eq!(ret, n);
                        live.push(n);
                        *model.entry(k).or_insert(0) += 1;
                    }
                    Op::Delete(k) => {
                        let hit = tree.lookup(k);
                        match model.get_mut(&k) {
                            Some(cnt) => {
                                let n = hit.expect("model has the key, the tree must too");
                                tree.delete(n);
                                prop_assert!(!n.as_ref().in_tree());
                                *cnt -= 1;
                                if *cnt == 0 {
                                    model.remove(&k);
                                }
                            }
                            None => prop_assert!(hit.is_none()),
                        }
                    }
                    Op::Lookup(k) => {
                        prop_assert_eq!(
                            tree.lookup(k).map(|n| n.as_ref().key()),
                            model.get(&k).map(|_| k)
                        );
                    }
                    Op::Floor(k) => {
                        prop_assert_eq!(
                            tree.lookup_le(k).map(|n| n.as_ref().key()),
                            model.range(..=k).next_back().map(|(&k, _)| k)
                        );
                    }
                    Op::Ceil(k) => {
                        prop_assert_eq!(
                            tree.lookup_ge(k).map(|n| n.as_ref().key()),
                            model.range(k..).next().map(|(&k, _)| k)
                        );
                    }
                }
            }

            // the multiset of stored keys matches the model exactly
            let mut walked: Vec<u64> = Vec::new();
            let mut cur = tree.first();
            while let Some(n) = cur {
                walked.push(n.as_ref().key());
                cur = tree.next(n);
            }
            let expect: Vec<u64> = model
                .iter()
                .flat_map(|(&k, &cnt)| std::iter::repeat(k).take(cnt))
                .collect();
            prop_assert_eq!(walked, expect);

            // distinct keys via the duplicate-skipping walk
            let mut distinct = Vec::new();
            let mut cur = tree.first();
            while let Some(n) = cur {
                distinct.push(n.as_ref().key());
                cur = tree.next_unique(n);
            }
            let expect: Vec<u64> = model.keys().copied().collect();
            prop_assert_eq!(distinct, expect);

            // tear everything down; double deletes must stay harmless
            for n in live.iter() {
                tree.delete(*n);
                tree.delete(*n);
            }
            prop_assert!(tree.is_empty());
            for n in live {
                drop(Box::from_raw(n.as_ptr()));
            }
        }
    }

    #[test]
    fn unique_trees_never_hold_a_key_twice(keys in proptest::collection::vec(0u64..32, 1..120)) {
        let mut tree = Box::new(Tree64::new_unique());
        let mut live: Vec<NonNull<Node64>> = Vec::new();
        let mut seen: BTreeMap<u64, NonNull<Node64>> = BTreeMap::new();

        unsafe {
            for k in keys {
                let n = NonNull::from(Box::leak(Box::new(Node64::new(k))));
                live.push(n);
                let ret = tree.insert(n);
                match seen.get(&k) {
                    Some(&incumbent) => {
                        prop_assert_eq!(ret, incumbent);
                        prop_assert!(!n.as_ref().in_tree());
                    }
                    None => {
                        prop_assert_eq!(ret, n);
                        seen.insert(k, n);
                    }
                }
            }

            let mut walked: Vec<u64> = Vec::new();
            let mut cur = tree.first();
            while let Some(n) = cur {
                walked.push(n.as_ref().key());
                cur = tree.next(n);
            }
            let expect: Vec<u64> = seen.keys().copied().collect();
            prop_assert_eq!(walked, expect);

            for n in live {
                tree.delete(n);
                drop(Box::from_raw(n.as_ptr()));
            }
        }
    }
}
