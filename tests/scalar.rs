use std::collections::BTreeMap;
use std::ptr::NonNull;

use rand::prelude::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use ebtree::{Node128, Node32, Node64, PtrNode, PtrTree, Tree128, Tree32, Tree64};

fn boxed32(keys: &[u32]) -> Vec<Box<Node32>> {
    keys.iter().map(|&k| Box::new(Node32::new(k))).collect()
}

unsafe fn walk32(tree: &Tree32) -> Vec<u32> {
    let mut out = Vec::new();
    let mut cur = tree.first();
    while let Some(n) = cur {
        out.push(n.as_ref().key());
        cur = tree.next(n);
    }
    out
}

unsafe fn walk32_back(tree: &Tree32) -> Vec<u32> {
    let mut out = Vec::new();
    let mut cur = tree.last();
    while let Some(n) = cur {
        out.push(n.as_ref().key());
        cur = tree.prev(n);
    }
    out
}

#[test]
fn ordered_walk_and_range_lookups() {
    let mut tree = Tree32::new();
    let mut nodes = boxed32(&[8, 10, 12, 13, 14]);

    unsafe {
        for n in nodes.iter_mut() {
            tree.insert(NonNull::from(&mut **n));
        }

        assert_eq!(tree.first().unwrap().as_ref().key(), 8);
        assert_eq!(tree.last().unwrap().as_ref().key(), 14);
        assert_eq!(walk32(&tree), vec![8, 10, 12, 13, 14]);
        assert_eq!(walk32_back(&tree), vec![14, 13, 12, 10, 8]);

        assert_eq!(tree.lookup_le(11).unwrap().as_ref().key(), 10);
        assert_eq!(tree.lookup_ge(11).unwrap().as_ref().key(), 12);
        assert_eq!(tree.lookup(13).unwrap().as_ref().key(), 13);
        assert!(tree.lookup(11).is_none());

        // boundary fallbacks
        assert!(tree.lookup_le(7).is_none());
        assert!(tree.lookup_ge(15).is_none());
        assert_eq!(tree.lookup_le(14).unwrap().as_ref().key(), 14);
        assert_eq!(tree.lookup_ge(8).unwrap().as_ref().key(), 8);

        let twelve = tree.lookup(12).unwrap();
        tree.delete(twelve);
        assert_eq!(walk32(&tree), vec![8, 10, 13, 14]);
        assert_eq!(tree.lookup_le(12).unwrap().as_ref().key(), 10);
    }
}

#[test]
fn duplicates_come_back_in_insertion_order() {
    let mut tree = Tree32::new();
    let mut nodes = boxed32(&[5, 5, 5]);

    unsafe {
        for n in nodes.iter_mut() {
            tree.insert(NonNull::from(&mut **n));
        }

        let first = tree.lookup(5).unwrap();
        assert_eq!(first.as_ptr(), &mut *nodes[0] as *mut Node32);

        let second = tree.next(first).unwrap();
        assert_eq!(second.as_ptr(), &mut *nodes[1] as *mut Node32);
        let third = tree.next(second).unwrap();
        assert_eq!(third.as_ptr(), &mut *nodes[2] as *mut Node32);
        assert!(tree.next(third).is_none());

        // reverse order from the other end
        let last = tree.last().unwrap();
        assert_eq!(last.as_ptr(), &mut *nodes[2] as *mut Node32);
        let mid = tree.prev(last).unwrap();
        assert_eq!(mid.as_ptr(), &mut *nodes[1] as *mut Node32);
        let head = tree.prev(mid).unwrap();
        assert_eq!(head.as_ptr(), &mut *nodes[0] as *mut Node32);
        assert!(tree.prev(head).is_none());
    }
}

#[test]
fn unique_mode_rejects_and_reports_the_incumbent() {
    let mut tree = Tree32::new_unique();
    assert!(tree.is_unique());

    let mut a = Box::new(Node32::new(42));
    let mut b = Box::new(Node32::new(42));
    let mut c = Box::new(Node32::new(7));

    unsafe {
        let ret = tree.insert(NonNull::from(&mut *a));
        assert_eq!(ret.as_ptr(), &mut *a as *mut Node32);

        // second 42 comes back as the first node, nothing is linked
        let ret = tree.insert(NonNull::from(&mut *b));
        assert_eq!(ret.as_ptr(), &mut *a as *mut Node32);
        assert!(!b.in_tree());

        tree.insert(NonNull::from(&mut *c));
        assert_eq!(walk32(&tree), vec![7, 42]);

        // the rejected node is still usable elsewhere
        let mut other = Tree32::new();
        other.insert(NonNull::from(&mut *b));
        assert!(b.in_tree());
        other.delete(NonNull::from(&mut *b));
    }
}

#[test]
fn signed_keys_enumerate_in_twos_complement_order() {
    let mut tree = Tree32::new();
    let keys: [i32; 5] = [1, -1, 2, -2, 0];
    let mut nodes: Vec<Box<Node32>> = keys.iter().map(|&k| Box::new(Node32::new_signed(k))).collect();

    unsafe {
        for n in nodes.iter_mut() {
            tree.insert_signed(NonNull::from(&mut **n));
        }

        assert_eq!(tree.first().unwrap().as_ref().key_signed(), -2);
        assert_eq!(tree.last().unwrap().as_ref().key_signed(), 2);

        let mut walked = Vec::new();
        let mut cur = tree.first();
        while let Some(n) = cur {
            walked.push(n.as_ref().key_signed());
            cur = tree.next(n);
        }
        assert_eq!(walked, vec![-2, -1, 0, 1, 2]);

        assert_eq!(tree.lookup_signed(-1).unwrap().as_ref().key_signed(), -1);
        assert!(tree.lookup_signed(3).is_none());
    }
}

#[test]
fn u64_boundaries_enumerate_unsigned() {
    let mut tree = Tree64::new();
    let keys = [0u64, 1 << 63, (1 << 63) + 1, u64::MAX];
    let mut nodes: Vec<Box<Node64>> = keys.iter().map(|&k| Box::new(Node64::new(k))).collect();

    unsafe {
        for n in nodes.iter_mut() {
            tree.insert(NonNull::from(&mut **n));
        }

        let mut walked = Vec::new();
        let mut cur = tree.first();
        while let Some(n) = cur {
            walked.push(n.as_ref().key());
            cur = tree.next(n);
        }
        assert_eq!(walked, keys.to_vec());

        assert_eq!(tree.lookup_le((1 << 63) - 1).unwrap().as_ref().key(), 0);
        assert_eq!(tree.lookup_ge((1 << 63) - 1).unwrap().as_ref().key(), 1 << 63);
        assert_eq!(tree.lookup(u64::MAX).unwrap().as_ref().key(), u64::MAX);
    }
}

#[test]
fn u128_keys_work_across_the_whole_width() {
    let mut tree = Tree128::new();
    let keys = [
        0u128,
        1,
        1 << 64,
        (1 << 64) + 5,
        1 << 127,
        u128::MAX,
    ];
    let mut nodes: Vec<Box<Node128>> = keys.iter().map(|&k| Box::new(Node128::new(k))).collect();

    unsafe {
        for n in nodes.iter_mut() {
            tree.insert(NonNull::from(&mut **n));
        }

        let mut walked = Vec::new();
        let mut cur = tree.first();
        while let Some(n) = cur {
            walked.push(n.as_ref().key());
            cur = tree.next(n);
        }
        assert_eq!(walked, keys.to_vec());

        assert_eq!(tree.lookup(1 << 127).unwrap().as_ref().key(), 1 << 127);
        assert_eq!(
            tree.lookup_le(u128::MAX - 1).unwrap().as_ref().key(),
            1 << 127
        );
        assert_eq!(tree.lookup_ge(2).unwrap().as_ref().key(), 1 << 64);

        let mut signed = Tree128::new();
        let mut a = Box::new(Node128::new_signed(-3i128));
        let mut b = Box::new(Node128::new_signed(4i128));
        signed.insert_signed(NonNull::from(&mut *a));
        signed.insert_signed(NonNull::from(&mut *b));
        assert_eq!(signed.first().unwrap().as_ref().key_signed(), -3);
    }
}

#[test]
fn random_read_back_against_a_model() {
    let key_cnt = 20_000usize;
    let mut r = StdRng::seed_from_u64(42);
    let mut keys: Vec<u32> = (0..key_cnt as u32).map(|i| i * 3).collect();
    keys.shuffle(&mut r);

    let mut tree = Tree32::new();
    let mut nodes = boxed32(&keys);

    unsafe {
        for n in nodes.iter_mut() {
            tree.insert(NonNull::from(&mut **n));
        }

        for &k in keys.iter() {
            assert_eq!(tree.lookup(k).unwrap().as_ref().key(), k);
        }
        // absent keys, between and beyond the stored ones
        assert!(tree.lookup(1).is_none());
        assert!(tree.lookup(3 * key_cnt as u32 + 1).is_none());

        let walked = walk32(&tree);
        let mut expect = keys.clone();
        expect.sort_unstable();
        assert_eq!(walked, expect);
    }
}

#[test]
fn floor_and_ceiling_match_the_model() {
    let mut r = StdRng::seed_from_u64(99);
    let keys: Vec<u32> = (0..4000).map(|_| r.gen_range(0..100_000u32)).collect();

    let mut tree = Tree32::new();
    let mut nodes = boxed32(&keys);
    let mut model: BTreeMap<u32, usize> = BTreeMap::new();

    unsafe {
        for n in nodes.iter_mut() {
            tree.insert(NonNull::from(&mut **n));
        }
        for &k in keys.iter() {
            *model.entry(k).or_insert(0) += 1;
        }

        for _ in 0..10_000 {
            let probe = r.gen_range(0..110_000u32);
            let le = tree.lookup_le(probe).map(|n| n.as_ref().key());
            let ge = tree.lookup_ge(probe).map(|n| n.as_ref().key());
            assert_eq!(le, model.range(..=probe).next_back().map(|(&k, _)| k));
            assert_eq!(ge, model.range(probe..).next().map(|(&k, _)| k));
            if model.contains_key(&probe) {
                assert_eq!(le, Some(probe));
                assert_eq!(ge, Some(probe));
                assert_eq!(tree.lookup(probe).map(|n| n.as_ref().key()), Some(probe));
            }
        }
    }
}

#[test]
fn next_unique_visits_each_key_once() {
    let mut tree = Tree32::new();
    let mut nodes = boxed32(&[3, 7, 3, 9, 7, 3, 11]);

    unsafe {
        for n in nodes.iter_mut() {
            tree.insert(NonNull::from(&mut **n));
        }

        let mut distinct = Vec::new();
        let mut cur = tree.first();
        while let Some(n) = cur {
            distinct.push(n.as_ref().key());
            cur = tree.next_unique(n);
        }
        assert_eq!(distinct, vec![3, 7, 9, 11]);

        let mut distinct_back = Vec::new();
        let mut cur = tree.last();
        while let Some(n) = cur {
            distinct_back.push(n.as_ref().key());
            cur = tree.prev_unique(n);
        }
        assert_eq!(distinct_back, vec![11, 9, 7, 3]);
    }
}

#[test]
fn delete_is_idempotent_and_local() {
    let mut tree = Tree32::new();
    let mut nodes = boxed32(&[1, 2, 3, 4]);

    unsafe {
        for n in nodes.iter_mut() {
            tree.insert(NonNull::from(&mut **n));
        }

        let two = NonNull::from(&mut *nodes[1]);
        tree.delete(two);
        assert!(!nodes[1].in_tree());
        // second delete is a no-op
        tree.delete(two);
        assert_eq!(walk32(&tree), vec![1, 3, 4]);

        // deleting every node empties the tree, stale handles included
        for n in nodes.iter_mut() {
            tree.delete(NonNull::from(&mut **n));
        }
        assert!(tree.is_empty());
        assert!(tree.first().is_none());
        assert!(tree.lookup_le(u32::MAX).is_none());
    }
}

#[test]
fn empty_tree_answers_nothing() {
    let tree = Tree32::new();
    unsafe {
        assert!(tree.first().is_none());
        assert!(tree.last().is_none());
        assert!(tree.lookup(0).is_none());
        assert!(tree.lookup_le(u32::MAX).is_none());
        assert!(tree.lookup_ge(0).is_none());
    }
    assert!(tree.is_empty());
    assert!(!tree.is_unique());
}

#[test]
fn pointer_tree_orders_by_address() {
    let storage = [0u64; 8];
    let mut tree = PtrTree::new();
    let mut nodes: Vec<Box<PtrNode>> = storage
        .iter()
        .map(|s| Box::new(PtrNode::new(s as *const u64 as *const ())))
        .collect();

    unsafe {
        // insert in reverse address order
        for n in nodes.iter_mut().rev() {
            tree.insert(NonNull::from(&mut **n));
        }

        let mut walked = Vec::new();
        let mut cur = tree.first();
        while let Some(n) = cur {
            walked.push(n.as_ref().key() as usize);
            cur = tree.next(n);
        }
        let expect: Vec<usize> = storage.iter().map(|s| s as *const u64 as usize).collect();
        assert_eq!(walked, expect);

        let probe = &storage[3] as *const u64 as *const ();
        assert_eq!(tree.lookup(probe).unwrap().as_ref().key(), probe);
        assert_eq!(tree.lookup_ge(probe).unwrap().as_ref().key(), probe);
        tree.delete(tree.lookup(probe).unwrap());
        assert!(tree.lookup(probe).is_none());
        assert_eq!(
            tree.lookup_ge(probe).unwrap().as_ref().key(),
            &storage[4] as *const u64 as *const ()
        );
    }
}

#[test]
fn stats_report_population_and_depth() {
    let mut tree = Tree32::new();
    let mut nodes = boxed32(&[1, 1, 1, 2, 3]);

    unsafe {
        for n in nodes.iter_mut() {
            tree.insert(NonNull::from(&mut **n));
        }
        let stats = tree.stats();
        assert_eq!(stats.leaves, 5);
        assert_eq!(stats.unique_keys, 3);
        assert_eq!(stats.duplicates, 2);
        assert!(stats.max_depth >= 1);
        assert!(stats.avg_depth > 0.0);

        let line = format!("{stats}");
        assert!(line.contains("leaves"));

        tree.delete(NonNull::from(&mut *nodes[0]));
        let stats = tree.stats();
        assert_eq!(stats.leaves, 4);
        assert_eq!(stats.duplicates, 1);
    }
}
