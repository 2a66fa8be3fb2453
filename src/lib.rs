//! `block-sort` sorts binary record files that do not fit in memory.
//!
//! A record file is a flat sequence of fixed 16-byte records: a big-endian `i64` identifier followed by a
//! big-endian `f64` key. Files are read and written in blocks of 512 records (8 KiB). Records are sorted by
//! key only, equal keys end up in no particular order.
//!
//! Sorting is done with an external merge sort in two phases:
//!
//! * **Run generation:** replacement selection streams the file through a bounded min-heap of 4096 records
//!   and writes sorted runs to a staging file. Records that arrive too late for the current run are parked
//!   in the unused tail of the heap buffer and seed the next run, so runs are usually much longer than the
//!   heap.
//! * **Multiway merge:** merge passes combine up to 8 neighbouring groups of blocks at a time. The group
//!   size starts at one block and is multiplied by the fan-in after every pass until a single group spans
//!   the whole file.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use block_sort::ExternalSorterBuilder;
//!
//! fn main() {
//!     let sorter = ExternalSorterBuilder::new()
//!         .with_tmp_dir(Path::new("./"))
//!         .build()
//!         .unwrap();
//!
//!     let summary = sorter.sort_file(Path::new("records.bin")).unwrap();
//!     println!("{} records sorted in {} merge passes", summary.records, summary.merge_passes);
//! }
//! ```

pub mod block;
pub mod buffer;
pub mod heap;
pub mod merger;
pub mod record;
pub mod run;
pub mod sort;
pub mod verify;

pub use block::{replace_contents, write_records, BlockFile, BlockWriter, BLOCK_SIZE, RECORDS_PER_BLOCK};
pub use buffer::{BlockBuffer, RecordSink};
pub use heap::{BoundedHeap, HeapError, RecordHeap};
pub use merger::{MergeStats, MultiwayMerger};
pub use record::{Record, RECORD_SIZE};
pub use run::{RunGenerator, RunStats};
pub use sort::{ExternalSorter, ExternalSorterBuilder, SortError, SortSummary};
pub use verify::{is_file_sorted, is_sorted};
