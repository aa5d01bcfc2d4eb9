#![no_main]
use std::collections::BTreeMap;
use std::ptr::NonNull;

use arbitrary::Arbitrary;
use ebtree::{Node32, Tree32};
use libfuzzer_sys::fuzz_target;

/// Differential check against the standard ordered map, duplicates
/// modelled as per-key counts.
#[derive(Arbitrary, Debug)]
enum MapMethod {
    Insert { key: u32 },
    Delete { key: u32 },
    Lookup { key: u32 },
    Floor { key: u32 },
    Ceil { key: u32 },
}

fuzz_target!(|methods: Vec<MapMethod>| {
    let mut tree = Box::new(Tree32::new());
    let mut model: BTreeMap<u32, usize> = BTreeMap::new();
    let mut live: Vec<NonNull<Node32>> = Vec::new();

    unsafe {
        for m in &methods {
            match m {
                MapMethod::Insert { key } => {
                    if live.len() >= 1 << 16 {
                        continue;
                    }
                    let n = NonNull::from(Box::leak(Box::new(Node32::new(*key))));
                    assert_eq!(tree.insert(n), n);
                    live.push(n);
                    *model.entry(*key).or_insert(0) += 1;
                }
                MapMethod::Delete { key } => {
                    let hit = tree.lookup(*key);
                    match model.get_mut(key) {
                        Some(cnt) => {
                            let n = hit.expect("tree lost a key the model holds");
                            tree.delete(n);
                            *cnt -= 1;
                            if *cnt == 0 {
                                model.remove(key);
                            }
                        }
                        None => assert!(hit.is_none()),
                    }
                }
                MapMethod::Lookup { key } => {
                    assert_eq!(
                        tree.lookup(*key).map(|n| n.as_ref().key()),
                        model.get(key).map(|_| *key)
                    );
                }
                MapMethod::Floor { key } => {
                    assert_eq!(
                        tree.lookup_le(*key).map(|n| n.as_ref().key()),
                        model.range(..=*key).next_back().map(|(&k, _)| k)
                    );
                }
                MapMethod::Ceil { key } => {
                    assert_eq!(
                        tree.lookup_ge(*key).map(|n| n.as_ref().key()),
                        model.range(*key..).next().map(|(&k, _)| k)
                    );
                }
            }
        }

        // full enumeration must reproduce the model multiset in order
        let mut walked: Vec<u32> = Vec::new();
        let mut cur = tree.first();
        while let Some(n) = cur {
            walked.push(n.as_ref().key());
            cur = tree.next(n);
        }
        let expect: Vec<u32> = model
            .iter()
            .flat_map(|(&k, &cnt)| std::iter::repeat(k).take(cnt))
            .collect();
        assert_eq!(walked, expect);

        for n in live {
            tree.delete(n);
            drop(Box::from_raw(n.as_ptr()));
        }
        assert!(tree.is_empty());
    }
});
