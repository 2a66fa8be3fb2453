//! Run generation by replacement selection.

use std::cmp::Ordering;
use std::io;

use log;

use crate::buffer::RecordSink;
use crate::heap::RecordHeap;
use crate::record::Record;
use crate::sort::SortError;

/// Summary of a run generation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Number of records in every generated run, in output order.
    pub run_lengths: Vec<u64>,
}

impl RunStats {
    pub fn runs(&self) -> usize {
        self.run_lengths.len()
    }

    pub fn records(&self) -> u64 {
        self.run_lengths.iter().sum()
    }
}

/// Replacement selection run generator.
///
/// Turns an unsorted record stream into a sequence of sorted runs written back to back.
/// The heap stays full while input lasts: every emitted minimum is replaced by the next input
/// record. A record smaller than the minimum it replaces cannot extend the current run, so it is
/// parked past the live region of the heap. When the live region runs dry the current run ends and
/// the parked records become the heap of the next run.
pub struct RunGenerator<'a> {
    heap: &'a mut RecordHeap,
    current: u64,
    stats: RunStats,
}

impl<'a> RunGenerator<'a> {
    /// Creates a run generator on top of `heap`. Any content left in the heap is discarded.
    pub fn new(heap: &'a mut RecordHeap) -> Self {
        heap.clear();

        return RunGenerator {
            heap,
            current: 0,
            stats: RunStats::default(),
        };
    }

    /// Consumes `input` and writes the generated runs to `output`.
    ///
    /// # Arguments
    /// * `input` - Records to be split into sorted runs
    /// * `output` - Sink receiving the runs concatenated
    pub fn generate<I, S>(mut self, input: I, output: &mut S) -> Result<RunStats, SortError>
    where
        I: IntoIterator<Item = io::Result<Record>>,
        S: RecordSink,
    {
        let mut input = input.into_iter();

        while !self.heap.is_full() {
            match input.next() {
                Some(record) => self.heap.insert(record?)?,
                None => break,
            }
        }
        log::debug!("heap filled with {} records", self.heap.len());

        for record in input {
            let record = record?;
            if self.heap.is_empty() {
                self.start_next_run();
            }

            let min = self.heap.peek_min()?;
            let emitted = if record.cmp_by_key(&min) == Ordering::Less {
                self.heap.defer_root(record)?
            } else {
                self.heap.replace_root(record)?
            };
            self.emit(emitted, output)?;
        }

        loop {
            while !self.heap.is_empty() {
                let record = self.heap.remove_min()?;
                self.emit(record, output)?;
            }
            if self.heap.deferred_len() == 0 {
                break;
            }
            self.start_next_run();
        }
        self.close_run();

        return Ok(self.stats);
    }

    fn emit<S: RecordSink>(&mut self, record: Record, output: &mut S) -> io::Result<()> {
        self.current += 1;
        output.put(record)
    }

    fn close_run(&mut self) {
        if self.current > 0 {
            log::debug!("run {} closed ({} records)", self.stats.runs(), self.current);
            self.stats.run_lengths.push(self.current);
            self.current = 0;
        }
    }

    fn start_next_run(&mut self) {
        self.close_run();
        let live = self.heap.promote_deferred();
        log::debug!("run {} started from {} deferred records", self.stats.runs(), live);
    }
}
