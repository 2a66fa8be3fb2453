//! Block-oriented access to record files.

use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use log;

use crate::buffer::{BlockBuffer, RecordSink};
use crate::record::{Record, RECORD_SIZE};

/// Number of records in a block by default.
pub const RECORDS_PER_BLOCK: usize = 512;
/// Block size in bytes by default.
pub const BLOCK_SIZE: usize = RECORDS_PER_BLOCK * RECORD_SIZE;

/// Random-access record file read and written in whole blocks.
///
/// A file is a plain sequence of 16-byte records. Its last block may be short, and trailing bytes
/// that do not form a complete record are skipped.
pub struct BlockFile {
    file: fs::File,
    records_per_block: usize,
    bytes: Vec<u8>,
}

impl BlockFile {
    /// Opens an existing file for reading.
    pub fn open(path: &Path, records_per_block: usize) -> io::Result<Self> {
        let file = fs::File::open(path)?;
        return Ok(Self::new(file, records_per_block));
    }

    /// Creates a file for writing, truncating any previous content.
    pub fn create(path: &Path, records_per_block: usize) -> io::Result<Self> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        return Ok(Self::new(file, records_per_block));
    }

    fn new(file: fs::File, records_per_block: usize) -> Self {
        BlockFile {
            file,
            records_per_block,
            bytes: vec![0; records_per_block * RECORD_SIZE],
        }
    }

    pub fn records_per_block(&self) -> usize {
        self.records_per_block
    }

    /// Block size in bytes.
    pub fn block_size(&self) -> usize {
        self.bytes.len()
    }

    /// File length in bytes.
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Number of block-sized reads needed to reach the end of the file, a short last block included.
    pub fn block_count(&self) -> io::Result<u64> {
        let block_size = self.block_size() as u64;
        return Ok((self.len()? + block_size - 1) / block_size);
    }

    /// Moves the read/write position back to the start of the file.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(io::SeekFrom::Start(0))?;
        Ok(())
    }

    /// Reads block `index` into `records`, replacing its content.
    /// Returns the number of records read, zero past the end of the file.
    pub fn read_block_at(&mut self, index: u64, records: &mut Vec<Record>) -> io::Result<usize> {
        let offset = index * self.block_size() as u64;
        self.file.seek(io::SeekFrom::Start(offset))?;
        self.read_next_block(records)
    }

    /// Reads the block at the current position into `records`, replacing its content.
    /// Returns the number of records read, zero at the end of the file.
    pub fn read_next_block(&mut self, records: &mut Vec<Record>) -> io::Result<usize> {
        let bytes_read = read_full(&mut self.file, &mut self.bytes)?;
        let tail = bytes_read % RECORD_SIZE;
        if tail != 0 {
            log::warn!("ignoring {} trailing bytes not forming a whole record", tail);
        }

        records.clear();
        records.extend(
            self.bytes[..bytes_read - tail]
                .chunks_exact(RECORD_SIZE)
                .map(Record::decode),
        );

        return Ok(records.len());
    }

    /// Writes `records` at the current position, one block at a time.
    pub fn write_block(&mut self, records: &[Record]) -> io::Result<()> {
        for block in records.chunks(self.records_per_block) {
            for (record, buf) in block.iter().zip(self.bytes.chunks_exact_mut(RECORD_SIZE)) {
                record.encode(buf);
            }
            self.file.write_all(&self.bytes[..block.len() * RECORD_SIZE])?;
        }
        Ok(())
    }

    /// Returns an iterator over the records from the current position to the end of the file.
    pub fn records(&mut self) -> Records<'_> {
        Records {
            file: self,
            block: Vec::new(),
            pos: 0,
            done: false,
        }
    }

    /// Collects the first record of every block.
    pub fn leading_records(&mut self) -> io::Result<Vec<Record>> {
        let mut leading = Vec::new();
        let mut block = Vec::with_capacity(self.records_per_block);

        self.rewind()?;
        while self.read_next_block(&mut block)? > 0 {
            leading.push(block[0]);
        }

        return Ok(leading);
    }
}

fn read_full(file: &mut fs::File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    return Ok(filled);
}

/// Sequential record iterator reading one block at a time.
pub struct Records<'a> {
    file: &'a mut BlockFile,
    block: Vec<Record>,
    pos: usize,
    done: bool,
}

impl<'a> Iterator for Records<'a> {
    type Item = io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos == self.block.len() {
            if self.done {
                return None;
            }
            match self.file.read_next_block(&mut self.block) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => self.pos = 0,
                Err(err) => {
                    self.done = true;
                    self.block.clear();
                    self.pos = 0;
                    return Some(Err(err));
                }
            }
        }

        let record = self.block[self.pos];
        self.pos += 1;
        return Some(Ok(record));
    }
}

/// Buffered record writer emitting whole blocks to a [`BlockFile`].
pub struct BlockWriter {
    file: BlockFile,
    buffer: BlockBuffer,
    written: u64,
}

impl BlockWriter {
    pub fn new(file: BlockFile) -> Self {
        let buffer = BlockBuffer::new(file.records_per_block());
        BlockWriter {
            file,
            buffer,
            written: 0,
        }
    }

    /// Number of records accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes the remaining records and returns the underlying file.
    pub fn finish(mut self) -> io::Result<BlockFile> {
        self.flush()?;
        self.file.file.flush()?;
        return Ok(self.file);
    }
}

impl RecordSink for BlockWriter {
    fn put(&mut self, record: Record) -> io::Result<()> {
        self.buffer.push(record);
        self.written += 1;
        if self.buffer.is_full() {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes out buffered records, possibly as a short block.
    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.file.write_block(self.buffer.as_slice())?;
            self.buffer.clear();
        }
        Ok(())
    }
}

/// Overwrites `target` with the content of `source`. Returns the number of bytes copied.
pub fn replace_contents(target: &Path, source: &Path) -> io::Result<u64> {
    let mut reader = io::BufReader::new(fs::File::open(source)?);
    let mut writer = io::BufWriter::new(
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(target)?,
    );

    let copied = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;

    return Ok(copied);
}

/// Writes `records` to a new file at `path`. Returns the number of records written.
pub fn write_records<I>(path: &Path, records_per_block: usize, records: I) -> io::Result<u64>
where
    I: IntoIterator<Item = Record>,
{
    let mut writer = BlockWriter::new(BlockFile::create(path, records_per_block)?);
    for record in records.into_iter() {
        writer.put(record)?;
    }
    let written = writer.written();
    writer.finish()?;

    return Ok(written);
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::Write;

    use rstest::*;

    use super::{replace_contents, write_records, BlockFile};
    use crate::{Record, RECORD_SIZE};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn records(keys: impl IntoIterator<Item = i64>) -> Vec<Record> {
        Vec::from_iter(keys.into_iter().map(|k| Record::new(k, k as f64)))
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(4, 1)]
    #[case(5, 2)]
    #[case(12, 3)]
    fn test_block_count(tmp_dir: tempfile::TempDir, #[case] len: i64, #[case] expected: u64) {
        let path = tmp_dir.path().join("data.bin");
        write_records(&path, 4, records(0..len)).unwrap();

        let file = BlockFile::open(&path, 4).unwrap();
        assert_eq!(file.len().unwrap(), len as u64 * RECORD_SIZE as u64);
        assert_eq!(file.block_count().unwrap(), expected);
    }

    #[rstest]
    fn test_read_block_at(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("data.bin");
        write_records(&path, 4, records(0..10)).unwrap();

        let mut file = BlockFile::open(&path, 4).unwrap();
        let mut block = Vec::new();

        assert_eq!(file.read_block_at(1, &mut block).unwrap(), 4);
        assert_eq!(block, records(4..8));
        assert_eq!(file.read_block_at(2, &mut block).unwrap(), 2);
        assert_eq!(block, records(8..10));
        assert_eq!(file.read_block_at(3, &mut block).unwrap(), 0);
        assert!(block.is_empty());
    }

    #[rstest]
    fn test_trailing_bytes_ignored(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("data.bin");
        write_records(&path, 4, records(0..3)).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(&[1, 2, 3])
            .unwrap();

        let mut file = BlockFile::open(&path, 4).unwrap();
        let restored: Result<Vec<Record>, _> = file.records().collect();
        assert_eq!(restored.unwrap(), records(0..3));
    }

    #[rstest]
    fn test_leading_records(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("data.bin");
        write_records(&path, 4, records(0..9)).unwrap();

        let mut file = BlockFile::open(&path, 4).unwrap();
        assert_eq!(file.leading_records().unwrap(), records([0, 4, 8]));
    }

    #[rstest]
    fn test_replace_contents(tmp_dir: tempfile::TempDir) {
        let source = tmp_dir.path().join("source.bin");
        let target = tmp_dir.path().join("target.bin");
        write_records(&source, 4, records(0..5)).unwrap();
        write_records(&target, 4, records(100..120)).unwrap();

        let copied = replace_contents(&target, &source).unwrap();
        assert_eq!(copied, 5 * RECORD_SIZE as u64);

        let mut file = BlockFile::open(&target, 4).unwrap();
        let restored: Result<Vec<Record>, _> = file.records().collect();
        assert_eq!(restored.unwrap(), records(0..5));
    }
}
