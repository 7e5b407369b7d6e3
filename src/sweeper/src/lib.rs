//! Pod Sweeper Library
//!
//! Periodically removes pods that will not recover on their own.
//!
//! A cleanup pass applies four rules in order:
//! - evicted: phase `Failed` with reason `Evicted`
//! - crash-loop-back-off: any container waiting with `CrashLoopBackOff`
//! - image-pull-back-off: any container waiting with `ImagePullBackOff`
//! - failed: phase `Failed` for any reason other than eviction
//!
//! Each rule lists the configured scope afresh and deletes every match.
//! Listing and deletion errors are logged and never abort a pass.

pub mod executor;
pub mod guard;
pub mod metrics;
pub mod rules;
pub mod scheduler;

// Re-export commonly used types
pub use executor::{DeletionOutcome, PassOutcome, PassReport, RuleReport, Sweeper};
pub use guard::{PassGuard, PassPermit};
pub use metrics::{MetricsSummary, SweepMetrics};
pub use rules::{CleanupRule, RuleError, RuleKind, RuleRegistry};
pub use scheduler::{CountedTicker, IntervalTicker, Scheduler, Ticker};
