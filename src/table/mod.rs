//! Sorted table files — on-disk format, reader, and entry types.
//!
//! A table file is an **immutable**, **sorted** sequence of key-value
//! entries with an embedded offset index. Keys are fixed-width 4-byte
//! integers; values are raw byte strings. A zero-length value is a
//! **tombstone** marking the key as deleted.
//!
//! # On-disk layout
//!
//! ```text
//! [file_size: u32 LE][write_time: i32 LE][entry_count: u32 LE]   header, 12 B
//! [key: i32 LE][value_offset: u32 LE]                            index, 8 B × entry_count
//! [value bytes, contiguous]                                      values
//! ```
//!
//! The index begins at offset 12. Values are stored back to back starting
//! at the first `value_offset`, which equals `12 + 8 × entry_count`. A
//! value's length is the next entry's offset minus its own; the last
//! entry's value runs to the end of the file.
//!
//! The `write_time` is a **per-table** logical timestamp: every entry in a
//! table shares it, and it decides which write wins when the same key
//! appears in several tables.
//!
//! # Guarantees
//!
//! - **Immutability:** tables are read once and never modified in place.
//! - **Ordering:** entries are strictly ascending by key; [`Table::load`]
//!   rejects files that violate this.
//! - **Validation:** header size, index bounds, and value offsets are
//!   checked against the real file length before any value is sliced.
//! - **Atomic writes:** [`TableBuilder`] writes through a temporary path
//!   and renames on success, so a table file is either complete or absent.
//!
//! # Sub-modules
//!
//! - [`builder`] — [`TableBuilder`] for writing new table files.

// ------------------------------------------------------------------------------------------------
// Sub-modules
// ------------------------------------------------------------------------------------------------

pub mod builder;

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Re-exports — public API surface
// ------------------------------------------------------------------------------------------------

pub use builder::TableBuilder;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::{fs::File, io, path::Path};

use memmap2::Mmap;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Size of the fixed table header: file size + write time + entry count.
pub const TABLE_HDR_SIZE: usize = 12;

/// Size of one index record: 4-byte key + 4-byte value offset.
pub const INDEX_RECORD_SIZE: usize = 8;

/// Write-time stamped on every output table produced by compaction.
///
/// Marks the file as the newest, merged generation: any later comparison
/// against an uncompacted table resolves in the merged table's favor.
pub const MERGED_WRITE_TIME: i32 = 0x00ff_ffff;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by table operations (load, build).
#[derive(Debug, Error)]
pub enum TableError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Header or index fields inconsistent with the actual file content.
    #[error("malformed table: {0}")]
    Malformed(String),

    /// A table being built would not fit the 32-bit size field.
    #[error("table of {0} bytes exceeds the 4 GiB format limit")]
    TooLarge(u64),
}

// ------------------------------------------------------------------------------------------------
// Entry
// ------------------------------------------------------------------------------------------------

/// A single key-value entry flowing through the compaction pipeline.
///
/// `value` is `None` for a **tombstone** (a delete marker). On disk a
/// tombstone is a zero-length value; the format has no way to store an
/// empty non-delete payload, so the mapping is lossless in both
/// directions.
///
/// `write_time` is copied from the owning table at load time — it is not
/// stored per entry on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Key of the entry.
    pub key: i32,

    /// Value of the entry; `None` marks the key as deleted.
    pub value: Option<Vec<u8>>,

    /// Write time inherited from the table this entry was loaded from.
    pub write_time: i32,
}

impl Entry {
    /// Creates a new put entry.
    pub fn put(key: i32, value: impl Into<Vec<u8>>, write_time: i32) -> Self {
        Self {
            key,
            value: Some(value.into()),
            write_time,
        }
    }

    /// Creates a new tombstone (delete marker) entry.
    pub fn tombstone(key: i32, write_time: i32) -> Self {
        Self {
            key,
            value: None,
            write_time,
        }
    }

    /// Returns `true` if this entry marks its key as deleted.
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Encoded footprint of this entry: one index record plus the value.
    ///
    /// This is the unit the writer's per-file byte budget is charged in.
    pub fn encoded_size(&self) -> usize {
        INDEX_RECORD_SIZE + self.value.as_ref().map_or(0, Vec::len)
    }

    /// The bytes written to the value region; empty for a tombstone.
    pub(crate) fn value_bytes(&self) -> &[u8] {
        self.value.as_deref().unwrap_or(&[])
    }
}

// ------------------------------------------------------------------------------------------------
// Table — immutable reader
// ------------------------------------------------------------------------------------------------

/// One fully-loaded, immutable sorted table.
#[derive(Debug, Clone)]
pub struct Table {
    /// Logical timestamp shared by every entry in this table.
    pub write_time: i32,

    /// Entries in strictly ascending key order.
    pub entries: Vec<Entry>,

    /// Total encoded length of the table, as declared by the header.
    pub byte_size: u32,
}

impl Table {
    /// Loads a table file from disk, validating the header and index
    /// before slicing any value.
    ///
    /// The file is memory-mapped read-only and fully decoded into owned
    /// entries; each value buffer is allocated to exactly its computed
    /// length.
    ///
    /// # Errors
    ///
    /// - [`TableError::Io`] if the file cannot be opened or mapped.
    /// - [`TableError::Malformed`] if the declared size disagrees with the
    ///   real file length, the index overruns the file, value offsets are
    ///   out of bounds or non-monotonic, or keys are not strictly
    ///   ascending.
    ///
    /// # Safety
    ///
    /// Uses `unsafe { Mmap::map(...) }` but is memory-safe because the
    /// mapping is read-only, the file is never written while loaded, and
    /// every slice boundary is validated against the mapped length first.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < TABLE_HDR_SIZE {
            return Err(TableError::Malformed(format!(
                "file of {} bytes is shorter than the {TABLE_HDR_SIZE}-byte header",
                mmap.len()
            )));
        }

        let declared_size = read_u32(&mmap, 0)? as usize;
        let write_time = read_i32(&mmap, 4)?;
        let entry_count = read_u32(&mmap, 8)? as usize;

        if declared_size != mmap.len() {
            return Err(TableError::Malformed(format!(
                "header declares {declared_size} bytes but the file is {} bytes",
                mmap.len()
            )));
        }

        let value_start = entry_count
            .checked_mul(INDEX_RECORD_SIZE)
            .and_then(|n| n.checked_add(TABLE_HDR_SIZE))
            .filter(|&end| end <= mmap.len())
            .ok_or_else(|| {
                TableError::Malformed(format!("index of {entry_count} records overruns the file"))
            })?;

        // Decode the index first; value lengths need the next record's offset.
        let mut index = Vec::with_capacity(entry_count);
        for nr in 0..entry_count {
            let base = TABLE_HDR_SIZE + nr * INDEX_RECORD_SIZE;
            let key = read_i32(&mmap, base)?;
            let offset = read_u32(&mmap, base + 4)? as usize;
            index.push((key, offset));
        }

        let mut entries = Vec::with_capacity(entry_count);
        for (nr, &(key, offset)) in index.iter().enumerate() {
            if nr > 0 && index[nr - 1].0 >= key {
                return Err(TableError::Malformed(format!(
                    "keys not strictly ascending: {} then {key}",
                    index[nr - 1].0
                )));
            }

            let end = match index.get(nr + 1) {
                Some(&(_, next_offset)) => next_offset,
                None => mmap.len(),
            };
            if offset < value_start || end < offset || end > mmap.len() {
                return Err(TableError::Malformed(format!(
                    "value offsets {offset}..{end} for key {key} out of range"
                )));
            }

            let value = &mmap[offset..end];
            entries.push(Entry {
                key,
                value: (!value.is_empty()).then(|| value.to_vec()),
                write_time,
            });
        }

        Ok(Self {
            write_time,
            entries,
            byte_size: declared_size as u32,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// Fixed-width field helpers
// ------------------------------------------------------------------------------------------------

fn read_u32(buf: &[u8], pos: usize) -> Result<u32, TableError> {
    let bytes: [u8; 4] = buf
        .get(pos..pos + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| TableError::Malformed(format!("truncated field at offset {pos}")))?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_i32(buf: &[u8], pos: usize) -> Result<i32, TableError> {
    read_u32(buf, pos).map(|v| v as i32)
}
