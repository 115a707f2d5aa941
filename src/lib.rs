//! # sstmerge
//!
//! An **SSTable compaction engine**: loads several immutable, sorted,
//! on-disk key-value table files, merges them into one globally
//! key-ordered stream, resolves duplicate keys by recency, discards
//! deleted entries, and repacks the cleaned result into new size-bounded
//! table files with a rebuilt index.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use sstmerge::{Compactor, Config, discover_tables};
//!
//! let compactor = Compactor::new(Config::default()).unwrap();
//!
//! // Enumerate input tables (ordered by numeric suffix: sstable-1.sst, …).
//! let inputs = discover_tables(Path::new("data/tables")).unwrap();
//!
//! // LOAD → MERGE → COMPACT → WRITE, one linear pass.
//! let summary = compactor.run(&inputs, Path::new("data/compacted")).unwrap();
//!
//! println!(
//!     "{} entries in, {} live, {} output files",
//!     summary.entries_merged,
//!     summary.entries_live,
//!     summary.outputs.len(),
//! );
//! ```
//!
//! ## Pipeline
//!
//! - **Load** — every input file is fully parsed into a [`Table`]
//!   ([`table`] module) before merging begins.
//! - **Merge** — a heap-based k-way merge produces one key-ascending
//!   stream, ties broken by input order ([`compaction::merge`]).
//! - **Resolve** — each key keeps its most recent write; tombstoned keys
//!   are purged ([`compaction::resolve`]).
//! - **Write** — greedy bin packing under a per-file byte budget, one
//!   atomically-written `output-<n>.sst` per partition
//!   ([`compaction::write_tables`]).
//!
//! The run is single-threaded and single-pass: no retries, no
//! checkpoints. The first fault aborts with a typed error; output files
//! are individually all-or-nothing (temporary path + rename).

pub mod compaction;
pub mod table;

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

pub use compaction::{CompactionError, MergeIterator, pack, resolve, write_tables};
pub use table::{Entry, MERGED_WRITE_TIME, Table, TableBuilder, TableError};

// ------------------------------------------------------------------------------------------------
// Configuration
// ------------------------------------------------------------------------------------------------

/// Default per-file payload budget for output tables: 256 KiB.
pub const DEFAULT_FILE_BUDGET: usize = 256 * 1024;

/// Configuration for a [`Compactor`].
///
/// # Example
///
/// ```rust
/// use sstmerge::Config;
///
/// // Use the default 256 KiB per-file budget
/// let config = Config::default();
///
/// // Or customize
/// let config = Config { file_budget: 64 * 1024 };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Soft byte budget for each output file, charged at
    /// `8 + value_length` per entry.
    ///
    /// A single entry larger than the budget is still written, alone in
    /// its own file — the budget never drops or truncates an entry.
    ///
    /// Default: 256 KiB. Must be ≥ 1.
    pub file_budget: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file_budget: DEFAULT_FILE_BUDGET,
        }
    }
}

impl Config {
    /// Validates all configuration parameters.
    fn validate(&self) -> Result<(), CompactError> {
        if self.file_budget == 0 {
            return Err(CompactError::InvalidConfig(
                "file_budget must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Error type
// ------------------------------------------------------------------------------------------------

/// Errors returned by [`Compactor`] operations.
#[derive(Debug, Error)]
pub enum CompactError {
    /// Invalid configuration parameter.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// An input table could not be opened or parsed. Malformed or missing
    /// input is an operator error; the run aborts on the first one.
    #[error("cannot load input table {}: {}", .path.display(), .source)]
    Input {
        /// Path of the offending input file.
        path: PathBuf,
        /// Underlying load failure.
        source: TableError,
    },

    /// Writing compaction output failed.
    #[error("{0}")]
    Compaction(#[from] CompactionError),

    /// I/O error while enumerating input tables.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// Run summary
// ------------------------------------------------------------------------------------------------

/// Counters and output paths from one compaction run.
#[derive(Debug)]
pub struct CompactionSummary {
    /// Number of input tables loaded.
    pub tables_in: usize,

    /// Total entries across all inputs (the merged stream length).
    pub entries_merged: usize,

    /// Entries surviving duplicate resolution and tombstone purging.
    pub entries_live: usize,

    /// Paths of the output tables, in file order.
    pub outputs: Vec<PathBuf>,
}

// ------------------------------------------------------------------------------------------------
// Compactor handle
// ------------------------------------------------------------------------------------------------

/// The compaction pipeline entry point.
///
/// Holds a validated [`Config`] and runs the LOAD → MERGE → COMPACT →
/// WRITE pipeline over a set of input tables. The pipeline is a single
/// synchronous pass with no shared mutable state; a `Compactor` can be
/// reused across runs.
#[derive(Debug)]
pub struct Compactor {
    config: Config,
}

impl Compactor {
    /// Creates a compactor with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CompactError::InvalidConfig`] if any parameter is out of
    /// range.
    pub fn new(config: Config) -> Result<Self, CompactError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Runs one full compaction over `inputs`, writing output tables into
    /// `output_dir`.
    ///
    /// Input order is significant: when the same key occurs in several
    /// tables with equal write-times, the earlier table wins. Prior
    /// output files with the same names are overwritten.
    ///
    /// An empty input list — or inputs whose every key resolves to a
    /// tombstone — produces zero output files.
    ///
    /// # Errors
    ///
    /// - [`CompactError::Input`] if any input cannot be opened or parsed.
    /// - [`CompactError::Compaction`] if writing an output file fails.
    pub fn run(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
    ) -> Result<CompactionSummary, CompactError> {
        // 1. Load every input fully before merging begins.
        let mut tables = Vec::with_capacity(inputs.len());
        for path in inputs {
            let table = Table::load(path).map_err(|source| CompactError::Input {
                path: path.clone(),
                source,
            })?;
            info!(
                path = %path.display(),
                entries = table.entries.len(),
                write_time = table.write_time,
                byte_size = table.byte_size,
                "loaded input table"
            );
            tables.push(table);
        }
        let entries_merged: usize = tables.iter().map(|t| t.entries.len()).sum();

        // 2–3. Merge into one stream, then resolve duplicates and purge
        // tombstones.
        let live = compaction::resolve(MergeIterator::over_tables(tables));
        let entries_live = live.len();
        info!(
            tables_in = inputs.len(),
            entries_merged, entries_live, "merge and conflict resolution complete"
        );

        // 4. Partition under the byte budget and write output tables.
        let partitions = compaction::pack(live, self.config.file_budget);
        let outputs = compaction::write_tables(partitions, output_dir)?;
        info!(
            outputs = outputs.len(),
            dir = %output_dir.display(),
            "compaction complete"
        );

        Ok(CompactionSummary {
            tables_in: inputs.len(),
            entries_merged,
            entries_live,
            outputs,
        })
    }

    /// Convenience wrapper: [`discover_tables`] on `input_dir`, then
    /// [`run`](Self::run).
    pub fn run_dir(
        &self,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<CompactionSummary, CompactError> {
        let inputs = discover_tables(input_dir)?;
        self.run(&inputs, output_dir)
    }
}

// ------------------------------------------------------------------------------------------------
// Input discovery
// ------------------------------------------------------------------------------------------------

/// Enumerates the `*.sst` files in `dir` in deterministic merge order.
///
/// Files are ordered by the numeric suffix of their stem (`sstable-2.sst`
/// before `sstable-10.sst`), with ties and suffix-less names falling back
/// to lexicographic path order. The order matters: it is the tie-break
/// order for equal keys with equal write-times.
pub fn discover_tables(dir: &Path) -> Result<Vec<PathBuf>, CompactError> {
    let mut found: Vec<(Option<u64>, PathBuf)> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("sst") {
            let suffix = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|stem| stem.rsplit('-').next())
                .and_then(|n| n.parse::<u64>().ok());
            found.push((suffix, path));
        }
    }

    found.sort_by(|(sa, pa), (sb, pb)| match (sa, sb) {
        (Some(a), Some(b)) => a.cmp(b).then_with(|| pa.cmp(pb)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => pa.cmp(pb),
    });

    Ok(found.into_iter().map(|(_, path)| path).collect())
}
