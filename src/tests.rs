extern crate std;

use std::{ops::Range, prelude::v1::*};

use proptest::prelude::*;
use rand::seq::SliceRandom;

use crate::model;

use super::*;

use crate::Dir::{Left, Right};

// Follows `path` from the root and asserts the key and balance factor of
// the node it lands on.
fn assert_node(map: &AvlMap<u32, u32>, path: &[Dir], key: u32, balance: i8) {
    let mut cur = map.root.expect("tree is empty");

    for &dir in path {
        cur = map.arena[cur].child(dir).expect("path leads off the tree");
    }

    assert_eq!(*map.arena[cur].key(), key);
    assert_eq!(map.arena[cur].balance(), balance);
}

fn insert_find_all(keys: &[u32]) {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for &key in keys {
        map.insert(key, key + 100);
        map.assert_invariants();
    }

    for &key in keys {
        let value = map.get(&key).expect("item not found");
        assert_eq!(*value, key + 100);
    }
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn four_elems_find() {
    insert_find_all(&[0, 1, 2, 3]);
    insert_find_all(&[0, 1, 3, 2]);
    insert_find_all(&[0, 2, 1, 3]);
    insert_find_all(&[0, 2, 3, 1]);
    insert_find_all(&[0, 3, 1, 2]);
    insert_find_all(&[0, 3, 2, 1]);

    insert_find_all(&[1, 0, 2, 3]);
    insert_find_all(&[1, 0, 3, 2]);
    insert_find_all(&[1, 2, 0, 3]);
    insert_find_all(&[1, 2, 3, 0]);
    insert_find_all(&[1, 3, 0, 2]);
    insert_find_all(&[1, 3, 2, 0]);

    insert_find_all(&[2, 0, 1, 3]);
    insert_find_all(&[2, 0, 3, 1]);
    insert_find_all(&[2, 1, 0, 3]);
    insert_find_all(&[2, 1, 3, 0]);
    insert_find_all(&[2, 3, 0, 1]);
    insert_find_all(&[2, 3, 1, 0]);

    insert_find_all(&[3, 0, 1, 2]);
    insert_find_all(&[3, 0, 2, 1]);
    insert_find_all(&[3, 1, 0, 2]);
    insert_find_all(&[3, 1, 2, 0]);
    insert_find_all(&[3, 2, 0, 1]);
    insert_find_all(&[3, 2, 1, 0]);
}

fn insert_remove_all(keys: &[u32]) {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for &key in keys {
        map.insert(key, key + 100);
        map.assert_invariants();
    }

    for &key in keys {
        let value = map.remove(&key).expect("item not found");
        assert_eq!(value, key + 100);
        map.assert_invariants();
    }

    for &key in keys {
        map.insert(key, key + 100);
        map.assert_invariants();
    }

    for &key in keys.iter().rev() {
        let value = map.remove(&key).expect("item not found");
        assert_eq!(value, key + 100);
        map.assert_invariants();
    }

    assert!(map.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_four() {
    insert_remove_all(&[0, 1, 2, 3]);
    insert_remove_all(&[0, 1, 3, 2]);
    insert_remove_all(&[0, 2, 1, 3]);
    insert_remove_all(&[0, 2, 3, 1]);
    insert_remove_all(&[0, 3, 1, 2]);
    insert_remove_all(&[0, 3, 2, 1]);

    insert_remove_all(&[1, 0, 2, 3]);
    insert_remove_all(&[1, 0, 3, 2]);
    insert_remove_all(&[1, 2, 0, 3]);
    insert_remove_all(&[1, 2, 3, 0]);
    insert_remove_all(&[1, 3, 0, 2]);
    insert_remove_all(&[1, 3, 2, 0]);

    insert_remove_all(&[2, 0, 1, 3]);
    insert_remove_all(&[2, 0, 3, 1]);
    insert_remove_all(&[2, 1, 0, 3]);
    insert_remove_all(&[2, 1, 3, 0]);
    insert_remove_all(&[2, 3, 0, 1]);
    insert_remove_all(&[2, 3, 1, 0]);

    insert_remove_all(&[3, 0, 1, 2]);
    insert_remove_all(&[3, 0, 2, 1]);
    insert_remove_all(&[3, 1, 0, 2]);
    insert_remove_all(&[3, 1, 2, 0]);
    insert_remove_all(&[3, 2, 0, 1]);
    insert_remove_all(&[3, 2, 1, 0]);
}

#[test]
fn insert_rebalances_leaning_chains() {
    // The first two runs force single rotations, the last two force double
    // rotations. All four settle into the same tree.
    for keys in [[10, 20, 30], [30, 20, 10], [30, 10, 20], [10, 30, 20]] {
        let mut map: AvlMap<u32, u32> = AvlMap::new();

        for key in keys {
            map.insert(key, 0);
            map.assert_invariants();
        }

        assert_node(&map, &[], 20, 0);
        assert_node(&map, &[Left], 10, 0);
        assert_node(&map, &[Right], 30, 0);
    }
}

#[test]
fn remove_leaf_adjusts_parent_without_rotation() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in [4, 2, 6, 1, 3, 5, 7] {
        map.insert(key, key + 100);
    }

    assert_eq!(map.remove(&1), Some(101));
    map.assert_invariants();

    assert_eq!(map.len(), 6);
    assert_eq!(map.get(&1), None);

    assert_node(&map, &[], 4, 0);
    assert_node(&map, &[Left], 2, 1);
    assert_node(&map, &[Left, Right], 3, 0);
    assert_node(&map, &[Right], 6, 0);
    assert_node(&map, &[Right, Left], 5, 0);
    assert_node(&map, &[Right, Right], 7, 0);
}

#[test]
fn remove_root_swaps_in_predecessor() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in [4, 2, 6, 1, 3, 5, 7] {
        map.insert(key, key + 100);
    }

    // The predecessor (3) takes over the root slot; its payload must come
    // through the swap intact.
    assert_eq!(map.remove(&4), Some(104));
    map.assert_invariants();

    assert_eq!(map.len(), 6);
    assert_eq!(map.get(&3), Some(&103));

    assert_node(&map, &[], 3, 0);
    assert_node(&map, &[Left], 2, -1);
    assert_node(&map, &[Left, Left], 1, 0);
    assert_node(&map, &[Right], 6, 0);
    assert_node(&map, &[Right, Left], 5, 0);
    assert_node(&map, &[Right, Right], 7, 0);
}

#[test]
fn remove_resolves_with_double_rotation() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in [4, 2, 6, 3] {
        map.insert(key, 0);
    }

    assert_eq!(map.remove(&6), Some(0));
    map.assert_invariants();

    assert_node(&map, &[], 3, 0);
    assert_node(&map, &[Left], 2, 0);
    assert_node(&map, &[Right], 4, 0);
}

#[test]
fn remove_with_balanced_heavy_child_keeps_height() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in [2, 1, 4, 3, 5] {
        map.insert(key, 0);
    }

    // The heavy child (4) is itself balanced, so the rotation must not
    // shorten the subtree and the walk must stop.
    assert_eq!(map.remove(&1), Some(0));
    map.assert_invariants();

    assert_node(&map, &[], 4, -1);
    assert_node(&map, &[Left], 2, 1);
    assert_node(&map, &[Left, Right], 3, 0);
    assert_node(&map, &[Right], 5, 0);
}

#[test]
fn remove_cascades_up_the_tree() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in [4, 2, 6, 1, 3, 5, 7, 0] {
        map.insert(key, 0);
    }

    assert_eq!(map.remove(&5), Some(0));
    map.assert_invariants();
    assert_eq!(map.remove(&7), Some(0));
    map.assert_invariants();

    assert_node(&map, &[], 2, 0);
    assert_node(&map, &[Left], 1, -1);
    assert_node(&map, &[Left, Left], 0, 0);
    assert_node(&map, &[Right], 4, 0);
    assert_node(&map, &[Right, Left], 3, 0);
    assert_node(&map, &[Right, Right], 6, 0);
}

#[test]
fn insert_existing_key_replaces_value() {
    let mut map: AvlMap<u32, &str> = AvlMap::new();

    assert_eq!(map.insert(1, "one"), None);
    assert_eq!(map.insert(2, "two"), None);
    assert_eq!(map.insert(1, "uno"), Some("one"));
    map.assert_invariants();

    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&1), Some(&"uno"));
    assert_eq!(map.get(&2), Some(&"two"));
}

#[test]
fn get_mut_updates_in_place() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    map.insert(1, 10);
    map.insert(2, 20);

    *map.get_mut(&1).expect("item not found") += 5;

    assert_eq!(map.get(&1), Some(&15));
    assert_eq!(map.get_mut(&3), None);
}

#[test]
fn lookup_by_borrowed_key() {
    let mut map: AvlMap<String, u32> = AvlMap::new();

    map.insert("apple".to_string(), 1);
    map.insert("banana".to_string(), 2);

    assert_eq!(map.get("banana"), Some(&2));
    assert!(map.contains_key("apple"));
    assert_eq!(map.remove("apple"), Some(1));
    assert_eq!(map.remove("apple"), None);
    map.assert_invariants();
}

#[test]
fn remove_missing_returns_none() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    assert_eq!(map.remove(&1), None);

    map.insert(1, 10);

    assert_eq!(map.remove(&2), None);
    assert_eq!(map.remove(&1), Some(10));
    assert_eq!(map.remove(&1), None);
    assert!(map.is_empty());
    map.assert_invariants();
}

#[test]
fn clear_empties_the_map() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    assert!(map.is_empty());

    for key in 0..10 {
        map.insert(key, key);
    }

    assert!(!map.is_empty());
    map.clear();

    assert!(map.is_empty());
    assert_eq!(map.len(), 0);
    assert_eq!(map.get(&3), None);

    map.insert(3, 33);
    map.assert_invariants();
    assert_eq!(map.get(&3), Some(&33));
}

#[test]
fn arena_reuses_released_slots() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in 0..8 {
        map.insert(key, key);
    }

    let slots = map.arena.slots.len();

    for key in 0..4 {
        map.remove(&key);
    }

    for key in 8..12 {
        map.insert(key, key);
    }

    map.assert_invariants();
    assert_eq!(map.arena.slots.len(), slots);
}

#[cfg(miri)]
const HEIGHT_KEYS: u32 = 100;

#[cfg(not(miri))]
const HEIGHT_KEYS: u32 = 10_000;

#[test]
fn height_stays_logarithmic() {
    fn height(map: &AvlMap<u32, u32>, node: Link) -> u32 {
        let Some(node) = node else {
            return 0;
        };

        let left = height(map, map.arena[node].left());
        let right = height(map, map.arena[node].right());

        1 + left.max(right)
    }

    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in 0..HEIGHT_KEYS {
        map.insert(key, key);

        let n = map.len() as f64;
        let bound = (1.45 * (n + 2.0).log2()).ceil() as u32;

        assert!(height(&map, map.root) <= bound);
    }

    map.assert_invariants();
}

#[cfg(miri)]
const SHUFFLED_KEYS: u32 = 64;

#[cfg(not(miri))]
const SHUFFLED_KEYS: u32 = 1000;

#[test]
fn shuffled_insert_remove_round_trip() {
    let mut rng = rand::thread_rng();
    let mut keys: Vec<u32> = (0..SHUFFLED_KEYS).collect();

    for _ in 0..4 {
        keys.shuffle(&mut rng);

        let mut map: AvlMap<u32, u32> = AvlMap::new();

        for &key in &keys {
            map.insert(key, key + 7);
        }

        map.assert_invariants();
        assert_eq!(map.len(), keys.len());

        keys.shuffle(&mut rng);

        for &key in &keys {
            assert_eq!(map.remove(&key), Some(key + 7));
        }

        assert!(map.is_empty());
        map.assert_invariants();
    }
}

#[test]
fn dotgraph_renders_every_node() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in [2, 1, 3] {
        map.insert(key, 0);
    }

    let mut out = String::new();
    map.dotgraph("tree", &mut out).expect("formatting failed");

    assert!(out.starts_with("digraph"));
    assert!(out.contains("label=\"2:0\""));
    assert!(out.contains("label=\"1:0\""));
    assert!(out.contains("label=\"3:0\""));
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }
}
