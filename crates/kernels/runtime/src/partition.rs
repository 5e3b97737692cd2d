//! Partitioning of an iteration space into chunks of offsets.
//!
//! # Architecture
//!
//! ```text
//! Offsets:   [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]
//!             └chunk 0┘└chunk 1┘└chunk 2┘└3┘      (chunk size 3)
//!
//! Dynamic:   chunks queued; idle workers take the next one
//! Static:    chunk c → worker c % workers
//!              worker 0: chunk 0, chunk 2
//!              worker 1: chunk 1, chunk 3
//! ```
//!
//! Within one chunk, offsets always run in ascending order on one worker.

use std::ops::Range;

/// Offsets covered by chunk `chunk` when `len` offsets are cut into pieces of
/// `chunk_size`.
pub fn chunk_range(chunk: usize, chunk_size: usize, len: usize) -> Range<usize> {
    let start = chunk * chunk_size;
    start..(start + chunk_size).min(len)
}

/// Number of chunks needed to cover `len` offsets.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size)
}

/// Grain size giving about four chunks per worker.
///
/// Oversubscribing balances uneven chunks and hides scheduling latency,
/// while the bounds keep per-chunk overhead and working set in check.
///
/// # Bounds
///
/// - Minimum: 64
/// - Maximum: 4096
pub fn auto_grain_size(len: usize, workers: usize) -> usize {
    let ideal = len / (workers.max(1) * 4);
    ideal.clamp(64, 4096)
}

/// Deterministic assignment of chunks to workers.
///
/// The schedule depends only on the iteration count, the chunk size and the
/// worker count, so repeated loops of the same size map every offset to the
/// same worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSchedule {
    len: usize,
    chunk_size: usize,
    workers: usize,
}

impl StaticSchedule {
    pub fn new(len: usize, chunk_size: usize, workers: usize) -> Self {
        Self {
            len,
            chunk_size: chunk_size.max(1),
            workers: workers.max(1),
        }
    }

    pub fn chunk_count(&self) -> usize {
        chunk_count(self.len, self.chunk_size)
    }

    /// Worker that executes `offset`.
    pub fn worker_for(&self, offset: usize) -> usize {
        (offset / self.chunk_size) % self.workers
    }

    /// Chunks owned by `worker`, in execution order.
    pub fn chunks_for(&self, worker: usize) -> impl Iterator<Item = Range<usize>> + '_ {
        (worker..self.chunk_count())
            .step_by(self.workers)
            .map(|chunk| chunk_range(chunk, self.chunk_size, self.len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_ranges_cover_tail() {
        assert_eq!(chunk_count(10, 3), 4);
        assert_eq!(chunk_range(0, 3, 10), 0..3);
        assert_eq!(chunk_range(3, 3, 10), 9..10);
        assert_eq!(chunk_count(0, 3), 0);
    }

    #[test]
    fn test_auto_grain_bounds() {
        assert_eq!(auto_grain_size(10, 8), 64);
        assert_eq!(auto_grain_size(100_000_000, 8), 4096);
        assert_eq!(auto_grain_size(64_000, 10), 1600);
        assert_eq!(auto_grain_size(1_000, 0), 250.clamp(64, 4096));
    }

    #[test]
    fn test_static_schedule_round_robin() {
        let schedule = StaticSchedule::new(10, 3, 2);
        assert_eq!(schedule.chunks_for(0).collect::<Vec<_>>(), vec![0..3, 6..9]);
        assert_eq!(schedule.chunks_for(1).collect::<Vec<_>>(), vec![3..6, 9..10]);
        assert_eq!(schedule.worker_for(4), 1);
        assert_eq!(schedule.worker_for(9), 1);
    }

    #[test]
    fn test_static_schedule_covers_every_offset_once() {
        let schedule = StaticSchedule::new(37, 4, 5);
        let mut seen = vec![0u32; 37];
        for worker in 0..5 {
            for range in schedule.chunks_for(worker) {
                for offset in range {
                    assert_eq!(schedule.worker_for(offset), worker);
                    seen[offset] += 1;
                }
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
    }
}
