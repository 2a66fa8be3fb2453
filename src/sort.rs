//! External sorter.

use log;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::path::Path;

use crate::block::{replace_contents, BlockFile, BlockWriter, RECORDS_PER_BLOCK};
use crate::heap::{HeapError, RecordHeap};
use crate::merger::MultiwayMerger;
use crate::record::RECORD_SIZE;
use crate::run::{RunGenerator, RunStats};
use crate::verify;

/// Heap capacity in blocks by default.
pub const HEAP_BLOCKS: usize = 8;
/// Merge fan-in by default.
pub const FAN_IN: usize = 8;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// Common I/O error.
    IO(io::Error),
    /// Heap contract violation.
    Heap(HeapError),
    /// Sorter parameters are inconsistent.
    InvalidConfig(String),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::TempDir(err) => Some(err),
            SortError::IO(err) => Some(err),
            SortError::Heap(err) => Some(err),
            SortError::InvalidConfig(_) => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::Heap(err) => write!(f, "heap invariant violated: {}", err),
            SortError::InvalidConfig(msg) => write!(f, "invalid sorter configuration: {}", msg),
        }
    }
}

impl From<io::Error> for SortError {
    fn from(err: io::Error) -> Self {
        SortError::IO(err)
    }
}

impl From<HeapError> for SortError {
    fn from(err: HeapError) -> Self {
        SortError::Heap(err)
    }
}

/// Outcome of sorting a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortSummary {
    /// Number of blocks in the file.
    pub blocks: u64,
    /// Number of records in the file.
    pub records: u64,
    /// Number of runs produced by replacement selection.
    pub runs: usize,
    /// Number of merge passes performed.
    pub merge_passes: usize,
    /// The file was found sorted and left untouched.
    pub already_sorted: bool,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone, Default)]
pub struct ExternalSorterBuilder {
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Number of records in a block.
    records_per_block: Option<usize>,
    /// Heap capacity in blocks.
    heap_blocks: Option<usize>,
    /// Number of runs merged at once.
    fan_in: Option<usize>,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        ExternalSorter::new(
            self.tmp_dir.as_deref(),
            self.records_per_block.unwrap_or(RECORDS_PER_BLOCK),
            self.heap_blocks.unwrap_or(HEAP_BLOCKS),
            self.fan_in.unwrap_or(FAN_IN),
        )
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets number of records in a block.
    pub fn with_records_per_block(mut self, records_per_block: usize) -> ExternalSorterBuilder {
        self.records_per_block = Some(records_per_block);
        return self;
    }

    /// Sets heap capacity in blocks.
    pub fn with_heap_blocks(mut self, heap_blocks: usize) -> ExternalSorterBuilder {
        self.heap_blocks = Some(heap_blocks);
        return self;
    }

    /// Sets number of runs merged at once.
    pub fn with_fan_in(mut self, fan_in: usize) -> ExternalSorterBuilder {
        self.fan_in = Some(fan_in);
        return self;
    }
}

/// External sorter.
///
/// Sorts a record file in place: replacement selection turns the file into sorted runs, then merge
/// passes with group sizes of 1, `fan_in`, `fan_in`², ... blocks combine them until a single group
/// spans the whole file.
pub struct ExternalSorter {
    /// Directory to be used to store temporary data.
    tmp_dir: tempfile::TempDir,
    /// Number of records in a block.
    records_per_block: usize,
    /// Heap capacity in blocks.
    heap_blocks: usize,
    /// Number of runs merged at once.
    fan_in: usize,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `tmp_path` - Directory to be used to store temporary data. If parameter is [`None`] default OS temporary
    ///   directory will be used.
    /// * `records_per_block` - Number of records in a block, the unit of every read and write.
    /// * `heap_blocks` - Heap capacity in blocks.
    /// * `fan_in` - Number of runs merged at once. The heap must be able to hold one block per merged run.
    pub fn new(
        tmp_path: Option<&Path>,
        records_per_block: usize,
        heap_blocks: usize,
        fan_in: usize,
    ) -> Result<Self, SortError> {
        Self::validate(records_per_block, heap_blocks, fan_in)?;

        return Ok(ExternalSorter {
            records_per_block,
            heap_blocks,
            fan_in,
            tmp_dir: Self::init_tmp_directory(tmp_path)?,
        });
    }

    fn validate(records_per_block: usize, heap_blocks: usize, fan_in: usize) -> Result<(), SortError> {
        if records_per_block == 0 {
            return Err(SortError::InvalidConfig("block must hold at least one record".into()));
        }
        if fan_in < 2 {
            return Err(SortError::InvalidConfig(format!("fan-in must be at least 2, got {}", fan_in)));
        }
        if heap_blocks < fan_in {
            return Err(SortError::InvalidConfig(format!(
                "heap of {} blocks cannot hold one block for each of {} merged runs",
                heap_blocks, fan_in
            )));
        }
        if heap_blocks.checked_mul(records_per_block).is_none() {
            return Err(SortError::InvalidConfig("heap capacity overflows".into()));
        }

        return Ok(());
    }

    fn init_tmp_directory(tmp_path: Option<&Path>) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = if let Some(tmp_path) = tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(|err| SortError::TempDir(err))?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    pub fn records_per_block(&self) -> usize {
        self.records_per_block
    }

    pub fn fan_in(&self) -> usize {
        self.fan_in
    }

    /// Heap capacity in records.
    pub fn heap_capacity(&self) -> usize {
        self.heap_blocks * self.records_per_block
    }

    /// Sorts the record file at `path` in place.
    ///
    /// A file that is already sorted is left untouched. On error the file content is unchanged
    /// unless the failure happens while copying the result back.
    ///
    /// # Arguments
    /// * `path` - Record file to be sorted
    pub fn sort_file(&self, path: &Path) -> Result<SortSummary, SortError> {
        let mut input = BlockFile::open(path, self.records_per_block)?;
        let mut summary = SortSummary {
            blocks: input.block_count()?,
            records: input.len()? / RECORD_SIZE as u64,
            ..SortSummary::default()
        };
        log::info!(
            "sorting {} ({} records, {} blocks)",
            path.display(),
            summary.records,
            summary.blocks
        );

        if verify::is_sorted(input.records())? {
            log::info!("input is already sorted");
            summary.already_sorted = true;
            return Ok(summary);
        }
        input.rewind()?;

        let mut run_file = self.create_tmp_file()?;
        let mut merge_file = self.create_tmp_file()?;
        let mut heap = RecordHeap::by_key(self.heap_capacity());

        let runs = self.generate_runs(&mut heap, &mut input, run_file.path())?;
        summary.runs = runs.runs();
        log::info!("replacement selection produced {} runs", summary.runs);

        let mut merger = MultiwayMerger::new(&mut heap, self.fan_in);
        let mut blocks_per_run: u64 = 1;
        while blocks_per_run < summary.blocks {
            let mut source = BlockFile::open(run_file.path(), self.records_per_block)?;
            let mut writer = BlockWriter::new(BlockFile::create(merge_file.path(), self.records_per_block)?);

            let stats = merger.merge_pass(&mut source, &mut writer, blocks_per_run)?;
            writer.finish()?;
            summary.merge_passes += 1;
            log::info!(
                "merge pass {} done (blocks per run: {}, groups: {}, batches: {})",
                summary.merge_passes,
                blocks_per_run,
                stats.groups,
                stats.batches
            );

            std::mem::swap(&mut run_file, &mut merge_file);
            blocks_per_run = blocks_per_run.saturating_mul(self.fan_in as u64);
        }

        drop(input);
        replace_contents(path, run_file.path())?;
        log::info!("{} sorted", path.display());

        return Ok(summary);
    }

    /// Runs replacement selection over `input` writing the runs to a new file at `runs_path`.
    pub fn generate_runs(
        &self,
        heap: &mut RecordHeap,
        input: &mut BlockFile,
        runs_path: &Path,
    ) -> Result<RunStats, SortError> {
        let mut writer = BlockWriter::new(BlockFile::create(runs_path, self.records_per_block)?);
        let stats = RunGenerator::new(heap).generate(input.records(), &mut writer)?;
        writer.finish()?;

        return Ok(stats);
    }

    fn create_tmp_file(&self) -> Result<tempfile::NamedTempFile, SortError> {
        tempfile::NamedTempFile::new_in(self.tmp_dir.path()).map_err(|err| SortError::TempDir(err))
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use rand::seq::SliceRandom;
    use rand::Rng;
    use rstest::*;

    use super::{ExternalSorter, ExternalSorterBuilder, SortError, SortSummary};
    use crate::block::{write_records, BlockFile};
    use crate::verify::is_file_sorted;
    use crate::Record;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn read_all(path: &Path, records_per_block: usize) -> Vec<Record> {
        let mut file = BlockFile::open(path, records_per_block).unwrap();
        let records: Result<Vec<Record>, _> = file.records().collect();
        records.unwrap()
    }

    fn sorter(tmp_dir: &tempfile::TempDir, records_per_block: usize, heap_blocks: usize, fan_in: usize) -> ExternalSorter {
        ExternalSorterBuilder::new()
            .with_tmp_dir(tmp_dir.path())
            .with_records_per_block(records_per_block)
            .with_heap_blocks(heap_blocks)
            .with_fan_in(fan_in)
            .build()
            .unwrap()
    }

    fn sorted_pairs(records: &[Record]) -> Vec<(i64, u64)> {
        let mut pairs = Vec::from_iter(records.iter().map(|r| (r.id(), r.key().to_bits())));
        pairs.sort();
        pairs
    }

    #[rstest]
    #[case(4, 2, 2, 1)]
    #[case(4, 2, 2, 37)]
    #[case(4, 8, 8, 1000)]
    #[case(2, 3, 3, 257)]
    #[case(8, 4, 2, 999)]
    #[case(512, 8, 8, 20_000)]
    fn test_external_sorter(
        tmp_dir: tempfile::TempDir,
        #[case] records_per_block: usize,
        #[case] heap_blocks: usize,
        #[case] fan_in: usize,
        #[case] len: usize,
    ) {
        let mut rng = rand::thread_rng();
        let input = Vec::from_iter((0..len).map(|id| Record::new(id as i64, rng.gen_range(-1e6..1e6))));
        let path = tmp_dir.path().join("input.bin");
        write_records(&path, records_per_block, input.clone()).unwrap();

        let summary = sorter(&tmp_dir, records_per_block, heap_blocks, fan_in)
            .sort_file(&path)
            .unwrap();

        let output = read_all(&path, records_per_block);
        assert!(is_file_sorted(&path, records_per_block).unwrap());
        assert_eq!(sorted_pairs(&output), sorted_pairs(&input));
        assert_eq!(summary.records, len as u64);
        assert_eq!(summary.blocks, ((len + records_per_block - 1) / records_per_block) as u64);
    }

    #[rstest]
    fn test_shuffled_permutation(tmp_dir: tempfile::TempDir) {
        let mut keys = Vec::from_iter(0..3000);
        keys.shuffle(&mut rand::thread_rng());
        let input = Vec::from_iter(keys.iter().map(|k| Record::new(*k as i64 * 10, *k as f64)));
        let path = tmp_dir.path().join("input.bin");
        write_records(&path, 16, input).unwrap();

        let summary = sorter(&tmp_dir, 16, 4, 4).sort_file(&path).unwrap();

        let output = read_all(&path, 16);
        let expected = Vec::from_iter((0..3000).map(|k| Record::new(k as i64 * 10, k as f64)));
        assert_eq!(output, expected);
        assert!(summary.runs >= 1);
        // 188 blocks: passes with 1, 4, 16 and 64 blocks per run
        assert_eq!(summary.merge_passes, 4);
    }

    #[rstest]
    fn test_duplicate_keys(tmp_dir: tempfile::TempDir) {
        let input = Vec::from_iter((0..500).map(|id| Record::new(id, (id % 7) as f64)));
        let path = tmp_dir.path().join("input.bin");
        write_records(&path, 4, input.clone()).unwrap();

        sorter(&tmp_dir, 4, 2, 2).sort_file(&path).unwrap();

        let output = read_all(&path, 4);
        assert!(is_file_sorted(&path, 4).unwrap());
        assert_eq!(sorted_pairs(&output), sorted_pairs(&input));
    }

    #[rstest]
    fn test_already_sorted(tmp_dir: tempfile::TempDir) {
        // equal keys in a fixed id order must survive untouched
        let input = Vec::from_iter((0..100).map(|id| Record::new(100 - id, (id / 3) as f64)));
        let path = tmp_dir.path().join("input.bin");
        write_records(&path, 4, input.clone()).unwrap();

        let summary = sorter(&tmp_dir, 4, 2, 2).sort_file(&path).unwrap();

        assert!(summary.already_sorted);
        assert_eq!(summary.runs, 0);
        assert_eq!(summary.merge_passes, 0);
        assert_eq!(read_all(&path, 4), input);
    }

    #[rstest]
    fn test_empty_file(tmp_dir: tempfile::TempDir) {
        let path = tmp_dir.path().join("input.bin");
        write_records(&path, 4, Vec::new()).unwrap();

        let summary = sorter(&tmp_dir, 4, 2, 2).sort_file(&path).unwrap();

        assert_eq!(
            summary,
            SortSummary {
                already_sorted: true,
                ..SortSummary::default()
            }
        );
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[rstest]
    fn test_missing_file(tmp_dir: tempfile::TempDir) {
        let result = sorter(&tmp_dir, 4, 2, 2).sort_file(&tmp_dir.path().join("missing.bin"));
        assert!(matches!(result, Err(SortError::IO(_))));
    }

    #[rstest]
    #[case(0, 8, 8)]
    #[case(512, 8, 1)]
    #[case(512, 4, 8)]
    fn test_invalid_config(#[case] records_per_block: usize, #[case] heap_blocks: usize, #[case] fan_in: usize) {
        let result = ExternalSorterBuilder::new()
            .with_records_per_block(records_per_block)
            .with_heap_blocks(heap_blocks)
            .with_fan_in(fan_in)
            .build();
        assert!(matches!(result, Err(SortError::InvalidConfig(_))));
    }
}
