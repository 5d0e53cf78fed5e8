use clap::Parser;
use open_hash::HashMap;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Percentage of the inserted keys to erase afterwards.
    #[arg(short = 'e', long = "erase_percent", default_value_t = 25)]
    erase_percent: usize,
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating HashMap with target capacity: {}",
        args.target_capacity
    );

    let mut map: HashMap<u64, u64> = HashMap::with_capacity(args.target_capacity);

    println!("Actual capacity: {}", map.capacity());
    println!("Bucket count: {}", map.bucket_count());
    println!("Filling map with u64 keys...");

    let num_values = map.capacity();
    for i in 0..num_values as u64 {
        let (_, inserted) = map.insert(i, i * 2);
        assert!(inserted, "key {i} already present");
    }

    println!("Inserted {} values into map", map.len());
    println!(
        "Load factor: {:.2}%",
        (map.len() as f64 / map.bucket_count() as f64) * 100.0
    );
    map.probe_histogram().print();
    map.debug_stats().print();

    let to_erase = num_values * args.erase_percent.min(100) / 100;
    let erased: usize = (0..to_erase as u64).map(|i| map.erase(&i)).sum();
    println!();
    println!("Erased {erased} keys; tombstones stay until the next growth");
    map.debug_stats().print();

    map.shrink_to_fit();
    println!();
    println!("After shrink_to_fit:");
    map.debug_stats().print();
}
