//! Fixed-width binary record.

use std::cmp::Ordering;

use byteorder::{BigEndian, ByteOrder};

/// Serialized record width in bytes: 8 bytes id followed by 8 bytes key.
pub const RECORD_SIZE: usize = 16;

/// A single record: a 64-bit identifier and a 64-bit floating-point sort key.
///
/// Records are ordered by key only, see [`Record::cmp_by_key`]. The `run` tag is never serialized,
/// it is attached while merging to remember which source a record came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    id: i64,
    key: f64,
    run: Option<u32>,
}

impl Record {
    pub fn new(id: i64, key: f64) -> Self {
        Record { id, key, run: None }
    }

    /// Creates a record tagged with the merge source it was read from.
    pub fn with_run(id: i64, key: f64, run: u32) -> Self {
        Record { id, key, run: Some(run) }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn key(&self) -> f64 {
        self.key
    }

    pub fn run(&self) -> Option<u32> {
        self.run
    }

    /// Compares two records by key using the IEEE 754 total order,
    /// so NaN keys and signed zeros have a well defined position.
    pub fn cmp_by_key(&self, other: &Record) -> Ordering {
        self.key.total_cmp(&other.key)
    }

    /// Decodes a record from the first [`RECORD_SIZE`] bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Self {
        Record::new(BigEndian::read_i64(&buf[0..8]), BigEndian::read_f64(&buf[8..RECORD_SIZE]))
    }

    /// Encodes the record into the first [`RECORD_SIZE`] bytes of `buf`.
    pub fn encode(&self, buf: &mut [u8]) {
        BigEndian::write_i64(&mut buf[0..8], self.id);
        BigEndian::write_f64(&mut buf[8..RECORD_SIZE], self.key);
    }
}

/// Key comparator in the form the heap expects.
pub type KeyOrder = fn(&Record, &Record) -> Ordering;
