//! Table writer — builds a complete table file from sorted entries.
//!
//! The [`TableBuilder`] computes the full layout up front (the header and
//! index sizes are known from the entry count, so value offsets are a
//! running accumulator starting at `12 + 8 × N`) and then streams header,
//! index records, and values through a buffered writer. No seeking is
//! needed.
//!
//! # Input requirements
//!
//! - `entries` must be **strictly ascending by key** — the builder rejects
//!   anything else, since a reader would refuse the resulting file.
//! - The per-entry `write_time` is **not** persisted; the table-level
//!   `write_time` argument stamps the whole file and is what readers hand
//!   back on every entry.
//!
//! # Atomicity
//!
//! 1. Write everything to `path.tmp`.
//! 2. Flush and sync the file.
//! 3. Rename `path.tmp` → `path` atomically.
//!
//! A failed run cannot leave a partially-written table under the final
//! name; an existing file at `path` is replaced wholesale.

use std::{
    fs::{OpenOptions, rename},
    io::{BufWriter, Write},
    path::Path,
};

use super::{Entry, INDEX_RECORD_SIZE, TABLE_HDR_SIZE, TableError};

/// Builds a complete table file on disk.
///
/// # Example
///
/// ```rust,ignore
/// TableBuilder::new(&path).build(write_time, &entries)?;
/// ```
pub struct TableBuilder<P: AsRef<Path>> {
    path: P,
}

impl<P: AsRef<Path>> TableBuilder<P> {
    /// Create a builder targeting the given output path.
    pub fn new(path: P) -> Self {
        Self { path }
    }

    /// Write a complete table file and return its encoded length.
    ///
    /// # Errors
    ///
    /// - [`TableError::Malformed`] if `entries` is not strictly ascending
    ///   by key.
    /// - [`TableError::TooLarge`] if the encoded table would not fit the
    ///   32-bit size field.
    /// - [`TableError::Io`] for any write, sync, or rename failure; the
    ///   final path is left untouched in that case.
    pub fn build(self, write_time: i32, entries: &[Entry]) -> Result<u32, TableError> {
        for pair in entries.windows(2) {
            if pair[0].key >= pair[1].key {
                return Err(TableError::Malformed(format!(
                    "entries not strictly ascending by key: {} then {}",
                    pair[0].key, pair[1].key
                )));
            }
        }

        let value_start = TABLE_HDR_SIZE + entries.len() * INDEX_RECORD_SIZE;
        let total = value_start as u64
            + entries
                .iter()
                .map(|e| e.value_bytes().len() as u64)
                .sum::<u64>();
        let file_size = u32::try_from(total).map_err(|_| TableError::TooLarge(total))?;

        let final_path = self.path.as_ref();
        let tmp_path = final_path.with_extension("tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(&file);

        // 1. Header
        writer.write_all(&file_size.to_le_bytes())?;
        writer.write_all(&write_time.to_le_bytes())?;
        writer.write_all(&(entries.len() as u32).to_le_bytes())?;

        // 2. Index — offsets accumulate from the end of the index block.
        let mut offset = value_start as u32;
        for entry in entries {
            writer.write_all(&entry.key.to_le_bytes())?;
            writer.write_all(&offset.to_le_bytes())?;
            offset += entry.value_bytes().len() as u32;
        }

        // 3. Values, contiguous.
        for entry in entries {
            writer.write_all(entry.value_bytes())?;
        }

        writer.flush()?;
        drop(writer);
        file.sync_all()?;

        rename(&tmp_path, final_path)?;
        Ok(file_size)
    }
}
