//! # Compaction Module
//!
//! The three transformation stages that sit between loaded input tables
//! and finished output files:
//!
//! ## Merge ([`merge::MergeIterator`])
//!
//! K-way heap merge of the loaded tables into one key-ascending stream,
//! every occurrence preserved, key ties broken by input-table order.
//!
//! ## Resolution ([`resolve`])
//!
//! Collapses each run of equal keys to the single winning occurrence (the
//! strictly greatest write-time; first-seen wins ties) and drops keys
//! whose winner is a tombstone. The output holds at most one entry per
//! key and no delete markers.
//!
//! ## Packing and writing ([`pack`], [`write_tables`])
//!
//! Greedy bin packing of the resolved stream under a per-file byte
//! budget, then one [`TableBuilder`] run per partition. Output files are
//! named `output-1.sst`, `output-2.sst`, … and stamped with
//! [`MERGED_WRITE_TIME`] so they read as the newest generation.
//!
//! ## Code organization
//!
//! Each stage is a pure transformation of the previous stage's output;
//! only [`write_tables`] touches the filesystem. This keeps merge,
//! resolution, and packing unit-testable without any I/O.

pub mod merge;

#[cfg(test)]
mod tests;

pub use merge::MergeIterator;

use std::mem;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::table::{Entry, MERGED_WRITE_TIME, TableBuilder, TableError};

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// File-name prefix for output tables; the numeric suffix counts up from 1.
const OUTPUT_FILE_PREFIX: &str = "output";

// ------------------------------------------------------------------------------------------------
// Shared error type
// ------------------------------------------------------------------------------------------------

/// Errors raised while writing compaction output.
#[derive(Debug, thiserror::Error)]
pub enum CompactionError {
    /// Building one output table failed. The file at `path` was either
    /// fully written or not created at all.
    #[error("failed to write output table {}: {}", .path.display(), .source)]
    Output {
        /// Path of the table that could not be written.
        path: PathBuf,
        /// Underlying build failure.
        source: TableError,
    },

    /// I/O error outside a single table build (e.g. creating the output
    /// directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// Resolution — one winner per key, tombstones purged
// ------------------------------------------------------------------------------------------------

/// Collapses a merged, key-ascending stream into the set of live entries.
///
/// Within a run of equal keys the tentative winner is replaced only when a
/// later occurrence has a **strictly greater** write-time; among equal
/// write-times the earliest-scanned occurrence is kept, which under the
/// merge's tie-break means the lowest input-table index. A winner whose
/// value is a tombstone is dropped entirely — deleted keys never reach the
/// output.
///
/// The final run is finalized after the scan loop; an empty input yields
/// an empty output.
pub fn resolve(merged: impl Iterator<Item = Entry>) -> Vec<Entry> {
    let mut live = Vec::new();
    let mut winner: Option<Entry> = None;

    for entry in merged {
        match winner.take() {
            None => winner = Some(entry),
            Some(current) if current.key == entry.key => {
                winner = Some(if entry.write_time > current.write_time {
                    entry
                } else {
                    current
                });
            }
            Some(current) => {
                if !current.is_tombstone() {
                    live.push(current);
                }
                winner = Some(entry);
            }
        }
    }

    if let Some(current) = winner
        && !current.is_tombstone()
    {
        live.push(current);
    }

    live
}

// ------------------------------------------------------------------------------------------------
// Packing — greedy partitioning under the byte budget
// ------------------------------------------------------------------------------------------------

/// Partitions resolved entries into output files under a per-file byte
/// budget.
///
/// Each entry costs [`Entry::encoded_size`] (8 bytes of index record plus
/// its value). Entries accumulate into the current partition while the
/// running total stays at or under `budget`; an entry that would push it
/// over closes the partition and starts the next one. The first entry of
/// a partition is always accepted, so an entry whose own cost exceeds the
/// budget ends up alone in its own file rather than being split or
/// dropped — the budget bounds file size best-effort.
pub fn pack(entries: Vec<Entry>, budget: usize) -> Vec<Vec<Entry>> {
    let mut partitions = Vec::new();
    let mut current = Vec::new();
    let mut used = 0usize;

    for entry in entries {
        let cost = entry.encoded_size();
        if !current.is_empty() && used + cost > budget {
            partitions.push(mem::take(&mut current));
            used = 0;
        }
        used += cost;
        current.push(entry);
    }

    if !current.is_empty() {
        partitions.push(current);
    }

    partitions
}

// ------------------------------------------------------------------------------------------------
// Output — one table file per partition
// ------------------------------------------------------------------------------------------------

/// Writes each partition as `output-<n>.sst` under `dir`, n counting up
/// from 1, all stamped with [`MERGED_WRITE_TIME`].
///
/// The directory is created if missing. Files from a previous run with
/// the same names are overwritten. Each file is written atomically
/// (temporary path, then rename), so a failure leaves no partial table
/// under a final name — though earlier files of the same run may already
/// exist.
pub fn write_tables(
    partitions: Vec<Vec<Entry>>,
    dir: &Path,
) -> Result<Vec<PathBuf>, CompactionError> {
    std::fs::create_dir_all(dir)?;

    let mut outputs = Vec::with_capacity(partitions.len());
    for (nr, partition) in partitions.into_iter().enumerate() {
        let path = dir.join(format!("{OUTPUT_FILE_PREFIX}-{}.sst", nr + 1));
        let payload: usize = partition.iter().map(Entry::encoded_size).sum();

        let written = TableBuilder::new(&path)
            .build(MERGED_WRITE_TIME, &partition)
            .map_err(|source| CompactionError::Output {
                path: path.clone(),
                source,
            })?;

        debug!(
            path = %path.display(),
            entries = partition.len(),
            payload,
            written,
            "wrote output table"
        );
        outputs.push(path);
    }

    Ok(outputs)
}
