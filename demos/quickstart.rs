use std::path;

use env_logger;
use log;
use rand::Rng;

use block_sort::{is_file_sorted, write_records, ExternalSorterBuilder, Record, RECORDS_PER_BLOCK};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let path = path::Path::new("records.bin");
    let mut rng = rand::thread_rng();
    let records = (0..100 * RECORDS_PER_BLOCK as i64).map(|id| Record::new(id, rng.gen_range(-1e9..1e9)));
    write_records(path, RECORDS_PER_BLOCK, records).unwrap();

    let sorter = ExternalSorterBuilder::new()
        .with_tmp_dir(path::Path::new("./"))
        .build()
        .unwrap();

    let summary = sorter.sort_file(path).unwrap();
    println!("{:?}", summary);
    println!("sorted: {}", is_file_sorted(path, RECORDS_PER_BLOCK).unwrap());
}
