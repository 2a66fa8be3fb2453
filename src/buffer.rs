//! Output block buffer.

use std::io;

use crate::record::Record;

/// Destination for a stream of records produced in sorted order.
pub trait RecordSink {
    /// Appends a record to the sink.
    fn put(&mut self, record: Record) -> io::Result<()>;

    /// Pushes out anything held back by the sink.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RecordSink for Vec<Record> {
    fn put(&mut self, record: Record) -> io::Result<()> {
        self.push(record);
        Ok(())
    }
}

/// Buffer holding at most one block of records.
///
/// The buffer is allocated once and cleared logically after every flush.
pub struct BlockBuffer {
    limit: usize,
    inner: Vec<Record>,
}

impl BlockBuffer {
    pub fn new(limit: usize) -> Self {
        BlockBuffer {
            limit,
            inner: Vec::with_capacity(limit),
        }
    }

    /// Adds a new record to the buffer.
    pub fn push(&mut self, record: Record) {
        self.inner.push(record);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Checks if the buffer reached the limit.
    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.inner
    }

    /// Resets the write cursor keeping the allocation.
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod test {
    use super::BlockBuffer;
    use crate::Record;

    #[test]
    fn test_block_buffer() {
        let mut buffer = BlockBuffer::new(2);

        buffer.push(Record::new(0, 0.0));
        assert_eq!(buffer.is_full(), false);
        buffer.push(Record::new(1, 1.0));
        assert_eq!(buffer.is_full(), true);
        assert_eq!(buffer.as_slice(), &[Record::new(0, 0.0), Record::new(1, 1.0)]);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.is_full(), false);
    }
}
