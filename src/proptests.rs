use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

fn validate_tree<V>(t: &RedBlackTree<V>) {
    if let Err(err) = t.check() {
        panic!("invalid tree: {err}");
    }

    let keys = t.keys_in_order();
    assert_eq!(keys.len(), t.len(), "in-order walk must reach every node");
    for pair in keys.windows(2) {
        assert!(pair[0] < pair[1], "keys out of order: {pair:?}");
    }

    // 2 * log2(n + 1) bounds the height of any red-black tree.
    let bound = 2.0 * ((t.len() + 1) as f64).log2();
    assert!(
        t.height() as f64 <= bound,
        "height {} exceeds {bound} for {} keys",
        t.height(),
        t.len()
    );
}

#[derive(Clone, Debug)]
enum Op {
    Insert(String, u32),
    Remove(String),
    Get(String),
}

fn key_strategy() -> impl Strategy<Value = String> + Clone {
    // A small alphabet keeps collisions frequent enough to exercise the
    // duplicate and removal paths.
    "[a-f]{0,3}"
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = key_strategy();
    let op = prop_oneof![
        50 => (key.clone(), any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        35 => key.clone().prop_map(Op::Remove),
        15 => key.clone().prop_map(Op::Get),
    ];
    prop::collection::vec(op, 0..=500)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut t: RedBlackTree<u32> = RedBlackTree::new();
        let mut m: BTreeMap<String, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let fresh = !m.contains_key(&key);
                    if fresh {
                        m.insert(key.clone(), value);
                    }
                    prop_assert_eq!(t.insert(&key, value), fresh);
                    prop_assert_eq!(t.get(&key), m.get(&key));
                }
                Op::Remove(key) => {
                    let depth_before = t.depth(&key);
                    let old_t = t.remove(&key);
                    let old_m = m.remove(&key);
                    prop_assert_eq!(old_t, old_m);
                    prop_assert_eq!(depth_before == 0, old_t.is_none());
                    prop_assert_eq!(t.depth(&key), 0);
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(&key), m.get(&key));
                }
            }

            prop_assert_eq!(t.len(), m.len());
            prop_assert_eq!(t.is_empty(), m.is_empty());
            prop_assert!(t.validate());
        }

        validate_tree(&t);
        let expected: Vec<String> = m.keys().cloned().collect();
        prop_assert_eq!(t.keys_in_order(), expected);
    }

    #[test]
    fn prop_depth_matches_black_depth(keys in prop::collection::vec("[a-z]{1,4}", 1..=200)) {
        let mut t: RedBlackTree<()> = RedBlackTree::new();
        for k in &keys {
            t.insert(k, ());
        }
        validate_tree(&t);

        for k in &keys {
            let depth = t.depth(k);
            let blacks = t.black_depth(k);
            prop_assert!(depth >= 1);
            prop_assert!(blacks < depth);
            // Reds never sit on consecutive levels.
            prop_assert!(depth - 1 <= 2 * blacks + 1);
        }
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

const SMALL_SET: [&str; 7] = ["a", "b", "c", "aa", "ab", "ba", "bb"];

#[test]
fn exhaustive_insert_order_small_set() {
    for_each_permutation(&SMALL_SET, |perm| {
        let mut t: RedBlackTree<usize> = RedBlackTree::new();
        for (i, k) in perm.iter().enumerate() {
            assert!(t.insert(k, i));
            validate_tree(&t);
        }
        for (i, k) in perm.iter().enumerate() {
            assert_eq!(t.get(k), Some(&i));
        }
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    // Insert in a fixed order, then remove in all permutations.
    let mut base: RedBlackTree<usize> = RedBlackTree::new();
    for (i, k) in SMALL_SET.iter().enumerate() {
        assert!(base.insert(k, i));
    }

    for_each_permutation(&SMALL_SET, |perm| {
        let mut t = base.clone();
        for k in perm {
            assert!(t.remove(k).is_some());
            assert_eq!(t.get(k), None);
            validate_tree(&t);
        }
        assert_eq!(t.len(), 0);
        assert!(t.root.is_none());
    });
}

#[test]
fn exhaustive_single_removal_from_every_shape() {
    // Every insertion order of the set yields some shape; removing each key
    // from each shape covers leaf, one-child and two-children removals on
    // both sides.
    for_each_permutation(&SMALL_SET[..6], |perm| {
        let mut base: RedBlackTree<usize> = RedBlackTree::new();
        for (i, k) in perm.iter().enumerate() {
            base.insert(k, i);
        }
        for k in &perm {
            let mut t = base.clone();
            assert!(t.remove(k).is_some());
            assert_eq!(t.len(), perm.len() - 1);
            validate_tree(&t);
        }
    });
}
