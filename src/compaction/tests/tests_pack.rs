//! Bin-packing tests.
//!
//! [`pack`] charges `8 + value_length` per entry against the per-file
//! budget: at-or-under fills the current partition, the first overflow
//! starts the next, and an entry bigger than the whole budget still gets
//! a partition of its own.

#[cfg(test)]
mod tests {
    use crate::compaction::pack;
    use crate::table::Entry;

    /// Entry with a value sized so its encoded footprint is exactly
    /// `cost` bytes.
    fn entry_costing(key: i32, cost: usize) -> Entry {
        assert!(cost >= 8);
        Entry::put(key, vec![0u8; cost - 8], 0)
    }

    fn partition_cost(partition: &[Entry]) -> usize {
        partition.iter().map(Entry::encoded_size).sum()
    }

    /// Entries summing to exactly the budget share one file — the bound
    /// is at-or-under, not strictly-under.
    #[test]
    fn exact_fit_stays_in_one_file() {
        let entries = vec![
            entry_costing(1, 40),
            entry_costing(2, 40),
            entry_costing(3, 20),
        ];

        let partitions = pack(entries, 100);

        assert_eq!(partitions.len(), 1);
        assert_eq!(partition_cost(&partitions[0]), 100);
    }

    /// The first entry that would push the running total over the budget
    /// closes the file and opens the next.
    #[test]
    fn overflow_starts_new_file() {
        let entries = vec![
            entry_costing(1, 60),
            entry_costing(2, 60), // 120 > 100 → second file
            entry_costing(3, 30),
        ];

        let partitions = pack(entries, 100);

        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].len(), 1);
        assert_eq!(partitions[1].len(), 2);
        assert_eq!(partition_cost(&partitions[1]), 90);
    }

    /// # Scenario
    /// One entry's own footprint exceeds the whole budget.
    ///
    /// # Expected behavior
    /// It is never split or dropped: it lands alone in its own partition,
    /// and packing continues normally afterwards.
    #[test]
    fn oversized_entry_gets_own_file() {
        let entries = vec![
            entry_costing(1, 50),
            entry_costing(2, 300), // alone: 300 > 100
            entry_costing(3, 50),
            entry_costing(4, 50),
        ];

        let partitions = pack(entries, 100);

        assert_eq!(partitions.len(), 3);
        assert_eq!(partitions[0].len(), 1);
        assert_eq!(partitions[1].len(), 1);
        assert_eq!(partitions[1][0].key, 2);
        assert_eq!(partition_cost(&partitions[1]), 300);
        assert_eq!(partitions[2].len(), 2);
    }

    /// A lone oversized entry as the whole input still produces exactly
    /// one partition.
    #[test]
    fn single_oversized_input() {
        let partitions = pack(vec![entry_costing(1, 5000)], 100);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].len(), 1);
    }

    /// Entry order is preserved across partition boundaries.
    #[test]
    fn order_preserved() {
        let entries: Vec<Entry> = (0..50).map(|key| entry_costing(key, 30)).collect();

        let partitions = pack(entries, 100);

        let keys: Vec<i32> = partitions.iter().flatten().map(|e| e.key).collect();
        assert_eq!(keys, (0..50).collect::<Vec<i32>>());
        // 3 entries of cost 30 per 100-byte file.
        assert!(partitions.iter().rev().skip(1).all(|p| p.len() == 3));
    }

    /// No entries, no partitions — and therefore no output files.
    #[test]
    fn empty_input() {
        assert!(pack(Vec::new(), 100).is_empty());
    }
}
