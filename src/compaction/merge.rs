//! Heap-based k-way merge over sorted entry streams.
//!
//! [`MergeIterator`] combines N individually-sorted sources into one
//! globally key-ascending stream. Every occurrence is preserved —
//! duplicate keys across sources are **not** collapsed here; that is the
//! resolution step's job. When two sources hold the same key, the source
//! with the **lower index** is drained first, which makes the merge order
//! deterministic and is what the recency resolution's first-seen tie-break
//! relies on.
//!
//! The heap holds at most one entry per source, so the merge runs in
//! `O(total_entries · log sources)`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::table::{Entry, Table};

// ------------------------------------------------------------------------------------------------
// MergeHeapEntry — ordering by (key ASC, source index ASC)
// ------------------------------------------------------------------------------------------------

struct MergeHeapEntry {
    entry: Entry,
    source: usize,
}

impl Ord for MergeHeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest key pops first.
        // On key ties the lower source index wins.
        other
            .entry
            .key
            .cmp(&self.entry.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

impl PartialOrd for MergeHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MergeHeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.entry.key == other.entry.key && self.source == other.source
    }
}

impl Eq for MergeHeapEntry {}

// ------------------------------------------------------------------------------------------------
// MergeIterator
// ------------------------------------------------------------------------------------------------

/// Merges N sorted entry streams into one key-ascending stream,
/// duplicates preserved.
///
/// Sources are expected to be strictly ascending by key individually —
/// the order [`Table::load`](crate::table::Table::load) guarantees.
pub struct MergeIterator<'a> {
    sources: Vec<Box<dyn Iterator<Item = Entry> + 'a>>,
    heap: BinaryHeap<MergeHeapEntry>,
}

impl<'a> MergeIterator<'a> {
    /// Builds a merge iterator from arbitrary sorted sources, seeding the
    /// heap with the head entry of each.
    pub fn new(mut sources: Vec<Box<dyn Iterator<Item = Entry> + 'a>>) -> Self {
        let mut heap = BinaryHeap::new();

        for (source, iter) in sources.iter_mut().enumerate() {
            if let Some(entry) = iter.next() {
                heap.push(MergeHeapEntry { entry, source });
            }
        }

        Self { sources, heap }
    }

    /// Builds a merge iterator over loaded tables, consuming them.
    ///
    /// Table order is significant: it is the tie-break order for equal
    /// keys.
    pub fn over_tables(tables: Vec<Table>) -> MergeIterator<'static> {
        MergeIterator::new(
            tables
                .into_iter()
                .map(|t| Box::new(t.entries.into_iter()) as Box<dyn Iterator<Item = Entry>>)
                .collect(),
        )
    }
}

impl Iterator for MergeIterator<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Self::Item> {
        let popped = self.heap.pop()?;
        let source = popped.source;

        if let Some(entry) = self.sources[source].next() {
            self.heap.push(MergeHeapEntry { entry, source });
        }

        Some(popped.entry)
    }
}
