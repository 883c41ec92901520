use super::AvlTree;

use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
enum Op {
    Insert(String, usize),
    Remove(String),
    Get(String),
    Range(String, String),
}

fn key_strategy() -> impl Strategy<Value = String> + Clone {
    // Small alphabet so that removals and duplicates hit existing keys often.
    "[a-f]{0,3}"
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = key_strategy();
    let op = prop_oneof![
        50 => (key.clone(), any::<usize>()).prop_map(|(k, v)| Op::Insert(k, v)),
        30 => key.clone().prop_map(Op::Remove),
        15 => key.clone().prop_map(Op::Get),
        5 => (key.clone(), key).prop_map(|(low, high)| Op::Range(low, high)),
    ];
    prop::collection::vec(op, 0..=500)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut tree = AvlTree::new();
        let mut model: BTreeMap<String, usize> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let inserted = tree.insert(key.as_str(), value);
                    prop_assert_eq!(inserted, !model.contains_key(&key));
                    model.entry(key).or_insert(value);
                }
                Op::Remove(key) => {
                    prop_assert_eq!(tree.remove(&key), model.remove(&key).is_some());
                }
                Op::Get(key) => {
                    prop_assert_eq!(tree.get(&key), model.get(&key).copied());
                    prop_assert_eq!(tree.contains(&key), model.contains_key(&key));
                }
                Op::Range(low, high) => {
                    let expected: Vec<String> = model
                        .keys()
                        .filter(|key| low <= **key && **key <= high)
                        .cloned()
                        .collect();
                    prop_assert_eq!(tree.find_range(&low, &high), expected);
                }
            }

            prop_assert_eq!(tree.size(), model.len());
        }

        tree.check_consistency();
        let got: Vec<(String, usize)> = tree.iter().map(|(k, v)| (k.to_owned(), v)).collect();
        let expected: Vec<(String, usize)> = model.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_balanced_after_every_update(keys in prop::collection::vec(key_strategy(), 0..=200)) {
        let mut tree = AvlTree::new();
        for key in &keys {
            tree.insert(key.as_str(), key.len());
            tree.check_consistency();
        }
        // Height of an AVL tree with n nodes is below 1.45 * log2(n + 2)
        let bound = 1.45 * ((tree.size() + 2) as f64).log2();
        prop_assert!((tree.height() as f64) < bound);

        let copy = tree.clone();
        for key in &keys {
            tree.remove(key);
            tree.check_consistency();
        }
        prop_assert!(tree.is_empty());
        prop_assert_eq!(tree.height(), 0);

        copy.check_consistency();
        prop_assert_eq!(copy.keys().len(), copy.size());
    }
}
