//! Wall-clock bookkeeping for analysis runs.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope timer around [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started: Instant,
}

impl Timer {
    /// Starts a new timer.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Time since [`Timer::start`].
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Runs `f` and returns its value together with the time it took.
    pub fn time<T>(f: impl FnOnce() -> T) -> (T, Duration) {
        let timer = Self::start();
        let value = f();
        (value, timer.elapsed())
    }
}

/// Timings of one block task.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockTiming {
    /// Position of the block in the partition plan.
    pub block_index: usize,
    /// Frames processed by the task.
    pub n_frames: usize,
    /// Total time spent in the task, I/O included.
    pub compute: Duration,
    /// Time spent waiting on the frame reader.
    pub io_wait: Duration,
}

/// Partial result of a block task together with its timings.
#[derive(Debug, Clone)]
pub struct BlockReport<P> {
    /// The block's accumulated partial result.
    pub partial: P,
    /// How long the block took.
    pub timing: BlockTiming,
}

/// Timings of a whole run, filled in phase by phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunTimings {
    /// When `prepare` started.
    pub started_at: Option<DateTime<Utc>>,
    /// When `conclude` finished.
    pub finished_at: Option<DateTime<Utc>>,
    pub prepare: Duration,
    /// Per-block timings, in block order.
    pub blocks: Vec<BlockTiming>,
    /// Wall time of the parallel phase, barrier included.
    pub wait: Duration,
    pub reduce: Duration,
    pub conclude: Duration,
}

impl RunTimings {
    pub(crate) fn record_start(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn record_end(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration between start and finish, if both were recorded.
    pub fn total(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Sum of per-block compute time across workers.
    pub fn compute_total(&self) -> Duration {
        self.blocks.iter().map(|b| b.compute).sum()
    }

    /// Sum of per-block I/O wait across workers.
    pub fn io_total(&self) -> Duration {
        self.blocks.iter().map(|b| b.io_wait).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_needs_both_ends() {
        let mut timings = RunTimings::default();
        assert!(timings.total().is_none());

        timings.record_start();
        assert!(timings.total().is_none());

        timings.record_end();
        let total = timings.total().unwrap();
        assert!(total >= chrono::Duration::zero());
    }

    #[test]
    fn test_block_sums() {
        let timings = RunTimings {
            blocks: vec![
                BlockTiming {
                    block_index: 0,
                    n_frames: 3,
                    compute: Duration::from_millis(30),
                    io_wait: Duration::from_millis(10),
                },
                BlockTiming {
                    block_index: 1,
                    n_frames: 2,
                    compute: Duration::from_millis(20),
                    io_wait: Duration::from_millis(5),
                },
            ],
            ..Default::default()
        };
        assert_eq!(timings.compute_total(), Duration::from_millis(50));
        assert_eq!(timings.io_total(), Duration::from_millis(15));
    }

    #[test]
    fn test_timer_measures_closure() {
        let (value, elapsed) = Timer::time(|| 6 * 7);
        assert_eq!(value, 42);
        assert!(elapsed < Duration::from_secs(5));
    }
}
