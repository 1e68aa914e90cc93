//! Row partitioning and cancellation for parallel passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Inclusive range of raster rows owned by one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowRange {
    pub first: usize,
    pub last: usize,
}

impl RowRange {
    /// Number of rows; zero when `last` precedes `first`.
    pub fn len(&self) -> usize {
        (self.last + 1).saturating_sub(self.first)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Percent of the range finished when `row` is about to start.
    pub fn percent_at(&self, row: usize) -> u8 {
        let len = self.len();
        if len == 0 {
            return 100;
        }
        let done = row.saturating_sub(self.first).min(len);
        (done * 100 / len) as u8
    }
}

/// Splits `total_rows` into at most `threads` contiguous, near-equal ranges.
///
/// Earlier ranges take the remainder rows. No range is empty, so fewer
/// ranges than `threads` come back when there are fewer rows.
pub fn partition_rows(total_rows: usize, threads: usize) -> Vec<RowRange> {
    if total_rows == 0 {
        return Vec::new();
    }
    let parts = threads.clamp(1, total_rows);
    let base = total_rows / parts;
    let extra = total_rows % parts;
    let mut ranges = Vec::with_capacity(parts);
    let mut first = 0usize;
    for i in 0..parts {
        let len = base + usize::from(i < extra);
        ranges.push(RowRange {
            first,
            last: first + len - 1,
        });
        first += len;
    }
    ranges
}

/// Worker count for a pass over `rows` rows.
///
/// `requested == 0` means one worker per available core.
pub fn thread_count(requested: usize, rows: usize) -> usize {
    let threads = if requested == 0 {
        std::thread::available_parallelism().map_or(1, |n| n.get())
    } else {
        requested
    };
    threads.clamp(1, rows.max(1))
}

/// Shared cancellation flag, set by the caller and polled by workers.
#[derive(Clone, Debug, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the current run.
    pub fn abort(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clears a previous request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::{partition_rows, thread_count, AbortFlag, RowRange};

    #[test]
    fn partition_covers_all_rows_once() {
        let ranges = partition_rows(10, 3);
        assert_eq!(
            ranges,
            vec![
                RowRange { first: 0, last: 3 },
                RowRange { first: 4, last: 6 },
                RowRange { first: 7, last: 9 },
            ]
        );
    }

    #[test]
    fn never_more_ranges_than_rows() {
        assert_eq!(partition_rows(2, 8).len(), 2);
        assert_eq!(partition_rows(5, 0).len(), 1);
        assert!(partition_rows(0, 4).is_empty());
        assert_eq!(thread_count(16, 3), 3);
        assert!(thread_count(0, 1000) >= 1);
    }

    #[test]
    fn percent_is_monotonic() {
        let range = RowRange { first: 4, last: 7 };
        let seen: Vec<u8> = (4..=7).map(|r| range.percent_at(r)).collect();
        assert_eq!(seen, vec![0, 25, 50, 75]);
    }

    #[test]
    fn range_length_and_emptiness() {
        let range = RowRange { first: 3, last: 3 };
        assert_eq!(range.len(), 1);
        assert!(!range.is_empty());

        let inverted = RowRange { first: 5, last: 3 };
        assert_eq!(inverted.len(), 0);
        assert!(inverted.is_empty());
        assert_eq!(inverted.percent_at(5), 100);
    }

    #[test]
    fn abort_flag_is_shared_between_clones() {
        let flag = AbortFlag::new();
        let other = flag.clone();
        other.abort();
        assert!(flag.is_set());
        flag.reset();
        assert!(!other.is_set());
    }
}
