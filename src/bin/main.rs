use avl_arena::AvlMap;

fn main() {
    let mut map: AvlMap<u32, &str> = AvlMap::new();

    for (key, name) in [
        (2, "two"),
        (0, "zero"),
        (3, "three"),
        (4, "four"),
        (5, "five"),
        (1, "one"),
        (6, "six"),
    ] {
        map.insert(key, name);
        map.assert_invariants();
        println!("inserted {key} => {name}, len = {}", map.len());
    }

    assert_eq!(map.len(), 7);
    assert_eq!(map.get(&4), Some(&"four"));

    assert_eq!(map.insert(4, "FOUR"), Some("four"));
    map.assert_invariants();
    assert_eq!(map.get(&4), Some(&"FOUR"));

    assert_eq!(map.remove(&0), Some("zero"));
    map.assert_invariants();
    assert_eq!(map.len(), 6);

    let mut dot = String::new();
    map.dotgraph("demo", &mut dot).expect("formatting failed");
    println!("{dot}");
}
