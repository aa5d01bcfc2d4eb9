#![no_main]
use std::collections::BTreeMap;
use std::ptr::NonNull;

use arbitrary::Arbitrary;
use ebtree::{MbNode, MbTree};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum MapMethod {
    Insert { key: [u8; 4] },
    Delete { key: [u8; 4] },
    Lookup { key: [u8; 4] },
}

fuzz_target!(|methods: Vec<MapMethod>| {
    let mut tree = Box::new(MbTree::<4>::new());
    let mut model: BTreeMap<[u8; 4], usize> = BTreeMap::new();
    let mut live: Vec<NonNull<MbNode<4>>> = Vec::new();

    unsafe {
        for m in &methods {
            match m {
                MapMethod::Insert { key } => {
                    if live.len() >= 1 << 16 {
                        continue;
                    }
                    let n = NonNull::from(Box::leak(Box::new(MbNode::new(*key))));
                    assert_eq!(tree.insert(n), n);
                    live.push(n);
                    *model.entry(*key).or_insert(0) += 1;
                }
                MapMethod::Delete { key } => {
                    let hit = tree.lookup(key);
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
                        tree.lookup(key).map(|n| *n.as_ref().key()),
                        model.get(key).map(|_| *key)
                    );
                }
            }
        }

        let mut walked: Vec<[u8; 4]> = Vec::new();
        let mut cur = tree.first();
        while let Some(n) = cur {
            walked.push(*n.as_ref().key());
            cur = tree.next(n);
        }
        let expect: Vec<[u8; 4]> = model
            .iter()
            .flat_map(|(&k, &cnt)| std::iter::repeat(k).take(cnt))
            .collect();
        assert_eq!(walked, expect);

        for n in live {
            tree.delete(n);
            drop(Box::from_raw(n.as_ptr()));
        }
    }
});
