//! Model-based equivalence testing against `std::collections::BTreeMap`.

extern crate std;

use std::{collections::BTreeMap, prelude::v1::*};

use arbitrary::Arbitrary;
use proptest::strategy::{Just, Strategy};

use crate::AvlMap;

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Get(ItemValue),
    Remove(ItemValue),
    ContainsKey(ItemValue),
    Len,
}

impl Op {
    // Resolves an `ItemValue` against the keys currently in the map, so
    // that `Index` variants are biased toward hits and `Random` variants
    // may miss.
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        fn get_key(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len().max(1)]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_key(sorted, item)),
            Op::Get(item) => FinalOp::Get(get_key(sorted, item)),
            Op::Remove(item) => FinalOp::Remove(get_key(sorted, item)),
            Op::ContainsKey(item) => FinalOp::ContainsKey(get_key(sorted, item)),
            Op::Len => FinalOp::Len,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Get(u32),
    Remove(u32),
    ContainsKey(u32),
    Len,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::Get),
        value_strategy().prop_map(Op::Remove),
        value_strategy().prop_map(Op::ContainsKey),
        Just(Op::Len),
    ]
}

/// Plays `ops` against both an [`AvlMap`] and a `BTreeMap`, asserting that
/// every observable result matches and that the tree invariants hold after
/// each operation.
pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut sorted_keys = Vec::with_capacity(ops.len());
    let mut btree = BTreeMap::new();
    let mut avl: AvlMap<u32, u32> = AvlMap::new();

    fn insert_sorted(v: &mut Vec<u32>, key: u32) {
        if let Err(idx) = v.binary_search(&key) {
            v.insert(idx, key);
        }
    }

    fn remove_sorted(v: &mut Vec<u32>, key: u32) {
        if let Ok(idx) = v.binary_search(&key) {
            v.remove(idx);
        }
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        // Values are the op index, so overwrites are observable.
        let marker = op_id as u32;
        let final_op = op.finalize(&sorted_keys);

        match final_op {
            FinalOp::Insert(key) => {
                insert_sorted(&mut sorted_keys, key);

                let from_btree = btree.insert(key, marker);
                let from_avl = avl.insert(key, marker);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::Get(key) => {
                let from_btree = btree.get(&key);
                let from_avl = avl.get(&key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::Remove(key) => {
                remove_sorted(&mut sorted_keys, key);

                let from_btree = btree.remove(&key);
                let from_avl = avl.remove(&key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::ContainsKey(key) => {
                let from_btree = btree.contains_key(&key);
                let from_avl = avl.contains_key(&key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {op:?}");
            }

            FinalOp::Len => {
                assert_eq!(btree.len(), avl.len(), "FinalOp #{op_id}: {op:?}");
            }
        }

        avl.assert_invariants();
        assert_eq!(btree.len(), avl.len());

        let mut pairs = Vec::with_capacity(avl.len());
        avl.for_each_in_order(|&k, &v| pairs.push((k, v)));
        assert!(btree
            .iter()
            .zip(pairs.iter())
            .all(|((&bk, &bv), &(k, v))| bk == k && bv == v));
    }
}
