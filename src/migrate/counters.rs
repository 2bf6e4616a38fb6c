//! Run counters shared by the capture and restore passes
//!
//! Relaxed atomics: the passes only need eventual totals and a progress
//! reading, never cross-counter consistency.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct RunCounters {
    /// Keys (or records) processed, successful or not
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    /// Extra attempts made by the retry policy
    retried: AtomicU64,
    start_time: Instant,
}

impl RunCounters {
    pub fn new() -> Self {
        Self {
            attempted: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_success(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> CounterSummary {
        CounterSummary {
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for RunCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of `RunCounters`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSummary {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub retried: u64,
    pub elapsed: Duration,
}

impl CounterSummary {
    /// Keys per second over the whole pass
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.attempted as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for CounterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempted, {} succeeded, {} failed",
            self.attempted, self.succeeded, self.failed
        )?;
        if self.retried > 0 {
            write!(f, ", {} retries", self.retried)?;
        }
        write!(f, " in {:.2}s", self.elapsed.as_secs_f64())
    }
}
