//! Multiway merger.

use std::cmp;

use log;

use crate::block::BlockFile;
use crate::buffer::RecordSink;
use crate::heap::RecordHeap;
use crate::record::Record;
use crate::sort::SortError;

/// Merge source lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceState {
    /// Some records of the current block are still in the heap.
    Active,
    /// The current block is used up and the next one has to be read.
    Refilling,
    /// The group's block range is exhausted.
    Retired,
}

/// Read cursor over one group of blocks.
#[derive(Debug)]
struct MergeSource {
    next_block: u64,
    end_block: u64,
    buffered: usize,
    state: SourceState,
}

impl MergeSource {
    fn new(first_block: u64, end_block: u64) -> Self {
        MergeSource {
            next_block: first_block,
            end_block,
            buffered: 0,
            state: SourceState::Refilling,
        }
    }

    /// Accounts for one of the source's records leaving the heap.
    fn consume(&mut self) {
        self.buffered -= 1;
        if self.buffered == 0 {
            self.state = SourceState::Refilling;
        }
    }
}

/// Summary of a single merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Number of groups the input was split into.
    pub groups: u64,
    /// Number of merge batches, each merging up to fan-in groups.
    pub batches: u64,
    /// Number of records written.
    pub records: u64,
}

/// Multiway merger.
///
/// One merge pass treats every `blocks_per_run` consecutive blocks of the input as a sorted group
/// and merges up to `fan_in` neighbouring groups at a time into one group of the output.
/// Each source keeps at most one block in the heap: a block is read only after all records of the
/// previous block of the same source were emitted.
pub struct MultiwayMerger<'a> {
    heap: &'a mut RecordHeap,
    fan_in: usize,
    block: Vec<Record>,
    sources: Vec<MergeSource>,
}

impl<'a> MultiwayMerger<'a> {
    /// Creates a merger on top of `heap`.
    ///
    /// # Arguments
    /// * `heap` - Heap able to hold `fan_in` blocks at once
    /// * `fan_in` - Maximum number of groups merged together
    pub fn new(heap: &'a mut RecordHeap, fan_in: usize) -> Self {
        return MultiwayMerger {
            heap,
            fan_in,
            block: Vec::new(),
            sources: Vec::with_capacity(fan_in),
        };
    }

    /// Performs one merge pass from `input` to `output`.
    ///
    /// # Arguments
    /// * `input` - File holding sorted groups of `blocks_per_run` blocks
    /// * `output` - Sink receiving merged groups of `blocks_per_run * fan_in` blocks
    /// * `blocks_per_run` - Group size in blocks, clamped to `1..=block_count`
    pub fn merge_pass<S: RecordSink>(
        &mut self,
        input: &mut BlockFile,
        output: &mut S,
        blocks_per_run: u64,
    ) -> Result<MergeStats, SortError> {
        let total_blocks = input.block_count()?;
        let bpr = blocks_per_run.clamp(1, cmp::max(total_blocks, 1));
        let mut stats = MergeStats {
            groups: (total_blocks + bpr - 1) / bpr,
            ..MergeStats::default()
        };

        let mut group = 0;
        while group < stats.groups {
            let batch = cmp::min(self.fan_in as u64, stats.groups - group);

            self.sources.clear();
            for idx in group..group + batch {
                let first_block = idx * bpr;
                let end_block = cmp::min(first_block + bpr, total_blocks);
                self.sources.push(MergeSource::new(first_block, end_block));
            }

            let merged = self.merge_batch(input, output)?;
            output.flush()?;
            log::debug!(
                "merged groups {}..{} ({} records, bpr: {})",
                group,
                group + batch,
                merged,
                bpr
            );

            stats.records += merged;
            stats.batches += 1;
            group += batch;
        }

        return Ok(stats);
    }

    fn merge_batch<S: RecordSink>(&mut self, input: &mut BlockFile, output: &mut S) -> Result<u64, SortError> {
        self.heap.clear();
        for idx in 0..self.sources.len() {
            self.refill(input, idx)?;
        }

        let mut merged = 0;
        while !self.heap.is_empty() {
            let record = self.heap.remove_min()?;
            output.put(Record::new(record.id(), record.key()))?;
            merged += 1;

            if let Some(idx) = record.run() {
                let idx = idx as usize;
                self.sources[idx].consume();
                self.refill(input, idx)?;
            }
        }

        return Ok(merged);
    }

    fn refill(&mut self, input: &mut BlockFile, idx: usize) -> Result<(), SortError> {
        let source = &mut self.sources[idx];

        while source.state == SourceState::Refilling {
            if source.next_block >= source.end_block {
                source.state = SourceState::Retired;
                break;
            }

            let count = input.read_block_at(source.next_block, &mut self.block)?;
            source.next_block += 1;
            if count == 0 {
                source.state = SourceState::Retired;
                break;
            }

            for record in self.block.iter() {
                self.heap.insert(Record::with_run(record.id(), record.key(), idx as u32))?;
            }
            source.buffered = count;
            source.state = SourceState::Active;
        }

        Ok(())
    }
}
