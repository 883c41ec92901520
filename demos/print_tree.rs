use avltree::AvlTree;

fn main() {
    // Trace level shows every rotation
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let mut tree = AvlTree::new();
    for (value, key) in ["a", "b", "c", "d", "e", "f", "g"].iter().enumerate() {
        tree.insert(*key, value);
    }
    tree.insert("a", 42);

    println!("Height: {}, size: {}", tree.height(), tree.size());
    print!("{tree}");

    tree.remove("d");
    tree["e"] += 100;
    println!("After removing \"d\":");
    print!("{tree}");

    println!("Keys in [b, e]: {:?}", tree.find_range("b", "e"));
    if let Err(err) = tree.try_value_mut("d") {
        println!("{err}");
    }
}
