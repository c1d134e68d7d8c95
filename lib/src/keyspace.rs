use serde::{Deserialize, Serialize};

use crate::ALPHABET_SIZE;

/// A contiguous half-open range `[start_index, start_index + count)` of the
/// global candidate index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub start_index: u64,
    pub count: u64,
}

/// Number of candidate strings of length `1..=max_length`.
///
/// For the maximum supported length of 8 this is ~2.9e12, so the whole
/// indexing path stays in 64-bit arithmetic.
pub fn total_combinations(max_length: u8) -> u64 {
    (1..=u32::from(max_length))
        .map(|len| ALPHABET_SIZE.pow(len))
        .sum()
}

/// Slice `total` indices into `task_size`-sized partitions, the last one
/// possibly shorter.
///
/// # Panics
///
/// Panics if `task_size` is zero.
pub fn partition(total: u64, task_size: u64) -> Vec<Partition> {
    assert!(task_size > 0, "task_size must be positive");

    let mut partitions = Vec::with_capacity(total.div_ceil(task_size) as usize);
    let mut start = 0;
    while start < total {
        let count = task_size.min(total - start);
        partitions.push(Partition {
            start_index: start,
            count,
        });
        start += count;
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_per_length() {
        assert_eq!(total_combinations(1), 36);
        assert_eq!(total_combinations(2), 36 + 36 * 36);
        assert_eq!(total_combinations(3), 36 + 1296 + 46_656);
    }

    #[test]
    fn max_length_total_needs_64_bits() {
        assert!(total_combinations(8) > u64::from(u32::MAX));
    }

    #[test]
    fn partitions_cover_the_keyspace() {
        for max_length in 1..=4u8 {
            let total = total_combinations(max_length);
            let partitions = partition(total, 1000);

            let mut expected_start = 0;
            for p in &partitions {
                assert_eq!(p.start_index, expected_start);
                assert!(p.count > 0);
                expected_start += p.count;
            }
            assert_eq!(expected_start, total);
        }
    }

    #[test]
    fn last_partition_may_be_shorter() {
        let partitions = partition(36 + 1296, 1000);
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].count, 1000);
        assert_eq!(partitions[1].count, 332);
    }

    #[test]
    fn task_size_larger_than_total_yields_one_partition() {
        let partitions = partition(36, 100_000);
        assert_eq!(
            partitions,
            vec![Partition {
                start_index: 0,
                count: 36
            }]
        );
    }

    #[test]
    fn empty_keyspace_yields_no_partitions() {
        assert!(partition(0, 100).is_empty());
    }

    #[test]
    #[should_panic(expected = "task_size must be positive")]
    fn zero_task_size_is_a_programmer_error() {
        partition(100, 0);
    }
}
