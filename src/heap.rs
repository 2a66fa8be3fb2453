//! Bounded binary min-heap with a movable live / deferred boundary.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::record::{KeyOrder, Record};

/// Heap contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// All slots of the backing buffer are occupied.
    Full,
    /// The live region holds no elements.
    Empty,
    /// Requested logical size exceeds the number of stored elements.
    InvalidSize { requested: usize, available: usize },
}

impl Error for HeapError {}

impl Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::Full => write!(f, "heap capacity exhausted"),
            HeapError::Empty => write!(f, "heap is empty"),
            HeapError::InvalidSize { requested, available } => write!(
                f,
                "logical size {} exceeds stored element count {}",
                requested, available
            ),
        }
    }
}

/// Array-backed binary min-heap of fixed capacity.
///
/// The backing buffer is split by a boundary index into two regions:
///
/// * `[0, live)` - the heap proper, always satisfying `parent <= children`;
/// * `[live, len)` - deferred elements parked for later, kept in no particular order.
///
/// Heap operations only ever look at the live region. Deferred elements are brought back with
/// [`BoundedHeap::promote_deferred`], which moves the boundary and rebuilds heap order in place.
/// The buffer is allocated once and never grows past `capacity`.
pub struct BoundedHeap<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    slots: Vec<T>,
    live: usize,
    capacity: usize,
    compare: F,
}

impl<T, F> BoundedHeap<T, F>
where
    T: Copy,
    F: Fn(&T, &T) -> Ordering,
{
    /// Creates an empty heap able to store `capacity` elements in total.
    ///
    /// # Arguments
    /// * `capacity` - Combined size of the live and deferred regions
    /// * `compare` - Function used to order elements, smallest first
    pub fn new(capacity: usize, compare: F) -> Self {
        return BoundedHeap {
            slots: Vec::with_capacity(capacity),
            live: 0,
            capacity,
            compare,
        };
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of elements taking part in heap ordering.
    pub fn live_len(&self) -> usize {
        self.live
    }

    /// Number of elements parked past the live region.
    pub fn deferred_len(&self) -> usize {
        self.slots.len() - self.live
    }

    /// Number of stored elements, live and deferred.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    /// Drops every stored element, live and deferred.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.live = 0;
    }

    /// Adds an element to the live region.
    pub fn insert(&mut self, item: T) -> Result<(), HeapError> {
        if self.is_full() {
            return Err(HeapError::Full);
        }

        // the first deferred element (if any) moves to the end to make room at the boundary
        self.slots.push(item);
        let last = self.slots.len() - 1;
        self.slots.swap(self.live, last);
        self.live += 1;
        self.sift_up(self.live - 1);

        return Ok(());
    }

    /// Adds an element to the deferred region without touching heap order.
    pub fn defer(&mut self, item: T) -> Result<(), HeapError> {
        if self.is_full() {
            return Err(HeapError::Full);
        }
        self.slots.push(item);

        return Ok(());
    }

    /// Returns the smallest live element.
    pub fn peek_min(&self) -> Result<T, HeapError> {
        if self.live == 0 {
            return Err(HeapError::Empty);
        }
        return Ok(self.slots[0]);
    }

    /// Removes and returns the smallest live element.
    pub fn remove_min(&mut self) -> Result<T, HeapError> {
        if self.live == 0 {
            return Err(HeapError::Empty);
        }

        self.live -= 1;
        self.slots.swap(0, self.live);
        // the last deferred element fills the hole left at the boundary
        let min = self.slots.swap_remove(self.live);
        self.sift_down(0);

        return Ok(min);
    }

    /// Overwrites the root with `item`, restores heap order and returns the previous root.
    ///
    /// Equivalent to `remove_min` followed by `insert` but never needs a free slot,
    /// so it works on a full heap.
    pub fn replace_root(&mut self, item: T) -> Result<T, HeapError> {
        if self.live == 0 {
            return Err(HeapError::Empty);
        }

        let min = std::mem::replace(&mut self.slots[0], item);
        self.sift_down(0);

        return Ok(min);
    }

    /// Removes the root and parks `item` in the deferred region, returning the previous root.
    ///
    /// The last live element takes the root's place and the slot it vacates becomes the first
    /// deferred slot, so the live region shrinks by one and no extra space is needed.
    pub fn defer_root(&mut self, item: T) -> Result<T, HeapError> {
        if self.live == 0 {
            return Err(HeapError::Empty);
        }

        self.live -= 1;
        let last = self.slots[self.live];
        let min = std::mem::replace(&mut self.slots[0], last);
        self.slots[self.live] = item;
        self.sift_down(0);

        return Ok(min);
    }

    /// Moves the live / deferred boundary to `size`.
    ///
    /// Heap order is not restored, call [`BoundedHeap::rebuild_heap_property`] afterwards.
    pub fn set_logical_size(&mut self, size: usize) -> Result<(), HeapError> {
        if size > self.slots.len() {
            return Err(HeapError::InvalidSize {
                requested: size,
                available: self.slots.len(),
            });
        }
        self.live = size;

        return Ok(());
    }

    /// Re-establishes heap order over the whole live region in O(n).
    pub fn rebuild_heap_property(&mut self) {
        for idx in (0..self.live / 2).rev() {
            self.sift_down(idx);
        }
    }

    /// Turns every stored element into a live one. Returns the new live size.
    pub fn promote_deferred(&mut self) -> usize {
        self.live = self.slots.len();
        self.rebuild_heap_property();

        return self.live;
    }

    fn less(&self, a: usize, b: usize) -> bool {
        (self.compare)(&self.slots[a], &self.slots[b]) == Ordering::Less
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.less(idx, parent) {
                break;
            }
            self.slots.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut smallest = idx;

            if left < self.live && self.less(left, smallest) {
                smallest = left;
            }
            if right < self.live && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == idx {
                break;
            }

            self.slots.swap(idx, smallest);
            idx = smallest;
        }
    }
}

/// Heap of records ordered by key.
pub type RecordHeap = BoundedHeap<Record, KeyOrder>;

impl BoundedHeap<Record, KeyOrder> {
    /// Creates an empty record heap of the given capacity.
    pub fn by_key(capacity: usize) -> Self {
        Self::new(capacity, Record::cmp_by_key)
    }
}
