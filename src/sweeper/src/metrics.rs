//! Sweep Metrics
//!
//! Thread-safe counters for monitoring cleanup passes across ticks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Thread-safe metrics for tracking cleanup passes
#[derive(Debug, Clone)]
pub struct SweepMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Passes that ran to completion
    passes_completed: AtomicUsize,
    /// Passes skipped because another pass was still running
    passes_skipped: AtomicUsize,
    /// Rules that could not list pods
    list_failures: AtomicUsize,
    /// Pods selected by a rule
    pods_matched: AtomicUsize,
    deletions_succeeded: AtomicUsize,
    deletions_failed: AtomicUsize,
    /// Matches logged but not deleted in dry-run mode
    dry_run_matches: AtomicUsize,
    total_duration_ms: AtomicU64,
}

impl Default for SweepMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepMetrics {
    /// Create a new metrics tracker
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                passes_completed: AtomicUsize::new(0),
                passes_skipped: AtomicUsize::new(0),
                list_failures: AtomicUsize::new(0),
                pods_matched: AtomicUsize::new(0),
                deletions_succeeded: AtomicUsize::new(0),
                deletions_failed: AtomicUsize::new(0),
                dry_run_matches: AtomicUsize::new(0),
                total_duration_ms: AtomicU64::new(0),
            }),
        }
    }

    pub fn record_pass_completed(&self, duration_ms: u64) {
        self.inner.passes_completed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_duration_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
    }

    pub fn record_pass_skipped(&self) {
        self.inner.passes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_list_failure(&self) {
        self.inner.list_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pods_matched(&self, count: usize) {
        self.inner.pods_matched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_deletion_succeeded(&self) {
        self.inner
            .deletions_succeeded
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deletion_failed(&self) {
        self.inner.deletions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dry_run_match(&self) {
        self.inner.dry_run_matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn passes_completed(&self) -> usize {
        self.inner.passes_completed.load(Ordering::Relaxed)
    }

    pub fn passes_skipped(&self) -> usize {
        self.inner.passes_skipped.load(Ordering::Relaxed)
    }

    pub fn list_failures(&self) -> usize {
        self.inner.list_failures.load(Ordering::Relaxed)
    }

    pub fn pods_matched(&self) -> usize {
        self.inner.pods_matched.load(Ordering::Relaxed)
    }

    pub fn deletions_succeeded(&self) -> usize {
        self.inner.deletions_succeeded.load(Ordering::Relaxed)
    }

    pub fn deletions_failed(&self) -> usize {
        self.inner.deletions_failed.load(Ordering::Relaxed)
    }

    pub fn dry_run_matches(&self) -> usize {
        self.inner.dry_run_matches.load(Ordering::Relaxed)
    }

    pub fn avg_pass_duration_ms(&self) -> f64 {
        let passes = self.passes_completed();
        if passes == 0 {
            return 0.0;
        }
        self.inner.total_duration_ms.load(Ordering::Relaxed) as f64 / passes as f64
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            passes_completed: self.passes_completed(),
            passes_skipped: self.passes_skipped(),
            list_failures: self.list_failures(),
            pods_matched: self.pods_matched(),
            deletions_succeeded: self.deletions_succeeded(),
            deletions_failed: self.deletions_failed(),
            dry_run_matches: self.dry_run_matches(),
            avg_pass_duration_ms: self.avg_pass_duration_ms(),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub passes_completed: usize,
    pub passes_skipped: usize,
    pub list_failures: usize,
    pub pods_matched: usize,
    pub deletions_succeeded: usize,
    pub deletions_failed: usize,
    pub dry_run_matches: usize,
    pub avg_pass_duration_ms: f64,
}

impl MetricsSummary {
    pub fn log(&self) {
        tracing::info!(
            passes_completed = self.passes_completed,
            passes_skipped = self.passes_skipped,
            list_failures = self.list_failures,
            pods_matched = self.pods_matched,
            deletions_succeeded = self.deletions_succeeded,
            deletions_failed = self.deletions_failed,
            dry_run_matches = self.dry_run_matches,
            avg_pass_duration_ms = self.avg_pass_duration_ms,
            "Sweep metrics summary"
        );
    }
}
