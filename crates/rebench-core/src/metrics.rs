//! Global atomic counters for evaluation runs.
//!
//! Counters are bumped at the call site; [`Metrics::flush`] emits all of
//! them as one `info!` event, typically after a batch of attempts.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    mirrors_cloned: AtomicU64,
    mirror_refresh_failures: AtomicU64,
    workspaces_created: AtomicU64,
    snapshots_created: AtomicU64,
    test_runs: AtomicU64,
    test_timeouts: AtomicU64,
    judge_calls: AtomicU64,
    bias_detected: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            mirrors_cloned: AtomicU64::new(0),
            mirror_refresh_failures: AtomicU64::new(0),
            workspaces_created: AtomicU64::new(0),
            snapshots_created: AtomicU64::new(0),
            test_runs: AtomicU64::new(0),
            test_timeouts: AtomicU64::new(0),
            judge_calls: AtomicU64::new(0),
            bias_detected: AtomicU64::new(0),
        }
    }

    pub fn inc_mirrors_cloned(&self) {
        self.mirrors_cloned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_mirror_refresh_failures(&self) {
        self.mirror_refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_workspaces_created(&self) {
        self.workspaces_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Only counts snapshots that produced a new commit.
    pub fn inc_snapshots_created(&self) {
        self.snapshots_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_test_runs(&self, timed_out: bool) {
        self.test_runs.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.test_timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// `calls` backend calls were made for one comparison.
    pub fn add_judge_calls(&self, calls: u64) {
        self.judge_calls.fetch_add(calls, Ordering::Relaxed);
    }

    pub fn inc_bias_detected(&self) {
        self.bias_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            mirrors_cloned = self.mirrors_cloned(),
            mirror_refresh_failures = self.mirror_refresh_failures(),
            workspaces_created = self.workspaces_created(),
            snapshots_created = self.snapshots_created(),
            test_runs = self.test_runs(),
            test_timeouts = self.test_timeouts(),
            judge_calls = self.judge_calls(),
            bias_detected = self.bias_detected(),
        );
    }

    pub fn mirrors_cloned(&self) -> u64 {
        self.mirrors_cloned.load(Ordering::Relaxed)
    }

    pub fn mirror_refresh_failures(&self) -> u64 {
        self.mirror_refresh_failures.load(Ordering::Relaxed)
    }

    pub fn workspaces_created(&self) -> u64 {
        self.workspaces_created.load(Ordering::Relaxed)
    }

    pub fn snapshots_created(&self) -> u64 {
        self.snapshots_created.load(Ordering::Relaxed)
    }

    pub fn test_runs(&self) -> u64 {
        self.test_runs.load(Ordering::Relaxed)
    }

    pub fn test_timeouts(&self) -> u64 {
        self.test_timeouts.load(Ordering::Relaxed)
    }

    pub fn judge_calls(&self) -> u64 {
        self.judge_calls.load(Ordering::Relaxed)
    }

    pub fn bias_detected(&self) -> u64 {
        self.bias_detected.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.mirrors_cloned,
            &self.mirror_refresh_failures,
            &self.workspaces_created,
            &self.snapshots_created,
            &self.test_runs,
            &self.test_timeouts,
            &self.judge_calls,
            &self.bias_detected,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
