//! Table build / round-trip tests.
//!
//! Exercise [`TableBuilder`] end to end: raw byte layout of the produced
//! file, reader round-trips, tombstone encoding, atomic replacement of an
//! existing file, and rejection of unsorted input.
//!
//! ## See also
//! - [`tests_read`] — reader against hand-assembled images

#[cfg(test)]
mod tests {
    use crate::table::{Entry, Table, TableBuilder, TableError};
    use std::fs;
    use tempfile::TempDir;
    use tracing::Level;
    use tracing_subscriber::fmt::Subscriber;

    fn init_tracing() {
        let _ = Subscriber::builder()
            .with_max_level(Level::TRACE)
            .try_init();
    }

    /// # Scenario
    /// Build a three-entry table and verify every byte region of the
    /// produced file against the on-disk layout.
    ///
    /// # Actions
    /// 1. `TableBuilder::build` with write-time 42.
    /// 2. Read the raw bytes back with `fs::read`.
    ///
    /// # Expected behavior
    /// - Returned size equals the real file length and the header's size
    ///   field.
    /// - Header: write-time 42, entry count 3.
    /// - Index offsets accumulate from `12 + 8 × 3`.
    /// - Values sit back to back after the index.
    /// - No `.tmp` file is left behind.
    #[test]
    fn build_layout() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("output-1.sst");

        let entries = vec![
            Entry::put(1, *b"ab", 0),
            Entry::put(5, *b"cdef", 0),
            Entry::put(9, *b"g", 0),
        ];

        let written = TableBuilder::new(&path).build(42, &entries).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), written as usize);
        assert_eq!(bytes.len(), 12 + 8 * 3 + 7);

        let u32_at = |pos: usize| u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap());
        let i32_at = |pos: usize| i32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap());

        assert_eq!(u32_at(0) as usize, bytes.len());
        assert_eq!(i32_at(4), 42);
        assert_eq!(u32_at(8), 3);

        // Index records: (key, offset) with offsets 36, 38, 42.
        assert_eq!(i32_at(12), 1);
        assert_eq!(u32_at(16), 36);
        assert_eq!(i32_at(20), 5);
        assert_eq!(u32_at(24), 38);
        assert_eq!(i32_at(28), 9);
        assert_eq!(u32_at(32), 42);

        assert_eq!(&bytes[36..], b"abcdefg");

        assert!(!path.with_extension("tmp").exists());
    }

    /// # Scenario
    /// Whatever the builder writes, the reader must reproduce: same keys,
    /// same values, tombstones included, write-time from the file.
    #[test]
    fn build_load_round_trip() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("output-1.sst");

        let entries = vec![
            Entry::put(-3, *b"neg", 99),
            Entry::tombstone(0, 99),
            Entry::put(7, vec![0xAB; 1000], 99),
        ];

        TableBuilder::new(&path).build(17, &entries).unwrap();
        let table = Table::load(&path).unwrap();

        assert_eq!(table.write_time, 17);
        assert_eq!(table.entries.len(), 3);
        for (loaded, original) in table.entries.iter().zip(&entries) {
            assert_eq!(loaded.key, original.key);
            assert_eq!(loaded.value, original.value);
            // Per-entry write-time is not persisted; the table's stamp wins.
            assert_eq!(loaded.write_time, 17);
        }
    }

    /// # Scenario
    /// A table of zero entries is legal output from the builder's point
    /// of view: a bare 12-byte header.
    #[test]
    fn build_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("output-1.sst");

        let written = TableBuilder::new(&path).build(5, &[]).unwrap();
        assert_eq!(written, 12);

        let table = Table::load(&path).unwrap();
        assert!(table.entries.is_empty());
        assert_eq!(table.write_time, 5);
    }

    /// # Scenario
    /// An existing file under the final name is replaced wholesale by the
    /// rename, never appended to or partially overwritten.
    #[test]
    fn build_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("output-1.sst");

        TableBuilder::new(&path)
            .build(1, &[Entry::put(1, vec![0u8; 4096], 0)])
            .unwrap();
        let first_len = fs::metadata(&path).unwrap().len();

        TableBuilder::new(&path)
            .build(2, &[Entry::put(1, *b"tiny", 0)])
            .unwrap();

        let table = Table::load(&path).unwrap();
        assert_eq!(table.write_time, 2);
        assert_eq!(table.entries[0].value.as_deref(), Some(b"tiny".as_slice()));
        assert!(fs::metadata(&path).unwrap().len() < first_len);
    }

    /// # Scenario
    /// Entries out of key order (or with duplicate keys) would produce a
    /// file the reader rejects, so the builder refuses them up front.
    #[test]
    fn build_rejects_unsorted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("output-1.sst");

        let unsorted = vec![Entry::put(5, *b"a", 0), Entry::put(3, *b"b", 0)];
        let err = TableBuilder::new(&path).build(1, &unsorted).unwrap_err();
        assert!(matches!(err, TableError::Malformed(_)));

        let duplicated = vec![Entry::put(5, *b"a", 0), Entry::put(5, *b"b", 0)];
        let err = TableBuilder::new(&path).build(1, &duplicated).unwrap_err();
        assert!(matches!(err, TableError::Malformed(_)));

        assert!(!path.exists());
    }
}
