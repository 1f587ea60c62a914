//! # Core Logic - Wallet Partitioning
//!
//! Splits a pool of `total` wallets into contiguous per-worker index ranges.
//! Every worker gets `total / workers` wallets and the first
//! `total % workers` workers get one extra, so block sizes never differ by
//! more than one.

use crate::error::DistributionError;
use std::ops::Range;

/// Index range owned by `worker_id` when `total` items are split across
/// `workers` workers.
pub fn partition_range(
    total: usize,
    workers: usize,
    worker_id: usize,
) -> Result<Range<usize>, DistributionError> {
    if workers == 0 {
        return Err(DistributionError::NoWorkers);
    }
    if worker_id >= workers {
        return Err(DistributionError::WorkerOutOfRange { worker_id, workers });
    }

    let base = total / workers;
    let remainder = total % workers;

    let start = worker_id * base + worker_id.min(remainder);
    let len = base + usize::from(worker_id < remainder);
    Ok(start..start + len)
}

/// All ranges for `workers` workers, in worker id order.
pub fn partition_all(total: usize, workers: usize) -> Result<Vec<Range<usize>>, DistributionError> {
    (0..workers)
        .map(|worker_id| partition_range(total, workers, worker_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        assert_eq!(partition_range(10, 2, 0).unwrap(), 0..5);
        assert_eq!(partition_range(10, 2, 1).unwrap(), 5..10);
    }

    #[test]
    fn test_remainder_goes_to_low_ids() {
        let ranges = partition_all(11, 3).unwrap();
        assert_eq!(ranges, vec![0..4, 4..8, 8..11]);
    }

    #[test]
    fn test_single_worker_takes_everything() {
        assert_eq!(partition_range(7, 1, 0).unwrap(), 0..7);
    }

    #[test]
    fn test_more_workers_than_items() {
        let ranges = partition_all(2, 4).unwrap();
        assert_eq!(ranges, vec![0..1, 1..2, 2..2, 2..2]);
    }

    #[test]
    fn test_invalid_arguments() {
        assert_eq!(partition_range(10, 0, 0), Err(DistributionError::NoWorkers));
        assert_eq!(
            partition_range(10, 2, 2),
            Err(DistributionError::WorkerOutOfRange {
                worker_id: 2,
                workers: 2
            })
        );
    }
}
