//! Cleanup pass execution.
//!
//! A pass applies every registered rule to the configured scope. Each rule
//! fetches its own snapshot, so a pod deleted by an earlier rule may show up
//! again for a later one. The resulting not-found delete is logged as a
//! warning and counted as a failed deletion.
//!
//! Failures never escape a pass:
//! - a failed listing ends that rule for this tick
//! - a failed deletion is logged and the rule moves on to the next pod
//!
//! Nothing is retried within a pass. A pod that still matches is picked up
//! again on the next tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use common::config::SweeperConfig;
use common::{PodApi, PodSnapshot, Scope};

use crate::guard::PassGuard;
use crate::metrics::SweepMetrics;
use crate::rules::{CleanupRule, RuleRegistry};

/// Result of one attempted (or, in dry-run mode, simulated) deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub namespace: String,
    pub name: String,
    pub rule: &'static str,
    pub succeeded: bool,
    pub dry_run: bool,
    pub error: Option<String>,
}

impl DeletionOutcome {
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// What one rule did during a pass.
#[derive(Debug, Clone)]
pub struct RuleReport {
    pub rule: &'static str,
    /// Pods returned by the rule's listing; `None` when the listing failed.
    pub pods_listed: Option<usize>,
    pub list_error: Option<String>,
    pub outcomes: Vec<DeletionOutcome>,
}

impl RuleReport {
    fn new(rule: &'static str) -> Self {
        Self {
            rule,
            pods_listed: None,
            list_error: None,
            outcomes: Vec::new(),
        }
    }

    pub fn matched(&self) -> usize {
        self.outcomes.len()
    }

    /// Delete calls actually issued (dry-run matches excluded).
    pub fn attempted(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.dry_run).count()
    }

    pub fn deleted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.succeeded && !o.dry_run)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded).count()
    }
}

/// Reports of every rule applied in one pass, in rule order.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub pass_id: u64,
    pub dry_run: bool,
    pub duration: Duration,
    pub rules: Vec<RuleReport>,
}

impl PassReport {
    pub fn attempted(&self) -> usize {
        self.rules.iter().map(RuleReport::attempted).sum()
    }

    pub fn deleted(&self) -> usize {
        self.rules.iter().map(RuleReport::deleted).sum()
    }

    pub fn failed(&self) -> usize {
        self.rules.iter().map(RuleReport::failed).sum()
    }

    pub fn matched(&self) -> usize {
        self.rules.iter().map(RuleReport::matched).sum()
    }

    pub fn list_failures(&self) -> usize {
        self.rules.iter().filter(|r| r.list_error.is_some()).count()
    }

    pub fn rule(&self, name: &str) -> Option<&RuleReport> {
        self.rules.iter().find(|r| r.rule == name)
    }

    /// Every deletion outcome of the pass, in rule order.
    pub fn outcomes(&self) -> impl Iterator<Item = &DeletionOutcome> {
        self.rules.iter().flat_map(|r| r.outcomes.iter())
    }

    pub fn log(&self) {
        info!(
            pass_id = self.pass_id,
            dry_run = self.dry_run,
            matched = self.matched(),
            deleted = self.deleted(),
            failed = self.failed(),
            list_failures = self.list_failures(),
            duration_ms = self.duration.as_millis() as u64,
            "Cleanup pass completed"
        );
    }
}

#[derive(Debug, Clone)]
pub enum PassOutcome {
    Completed(PassReport),
    /// Another pass was still running; nothing was done.
    Skipped,
}

impl PassOutcome {
    pub fn report(&self) -> Option<&PassReport> {
        match self {
            PassOutcome::Completed(report) => Some(report),
            PassOutcome::Skipped => None,
        }
    }
}

/// Applies cleanup rules to a scope through a [`PodApi`].
pub struct Sweeper {
    api: Arc<dyn PodApi>,
    scope: Scope,
    rules: RuleRegistry,
    config: SweeperConfig,
    metrics: SweepMetrics,
    guard: PassGuard,
    passes: AtomicU64,
}

impl Sweeper {
    /// Sweeper running the built-in rules enabled in `config`.
    pub fn new(api: Arc<dyn PodApi>, scope: Scope, config: SweeperConfig) -> Self {
        let rules = RuleRegistry::from_config(&config.rules);
        Self::with_rules(api, scope, config, rules)
    }

    pub fn with_rules(
        api: Arc<dyn PodApi>,
        scope: Scope,
        config: SweeperConfig,
        rules: RuleRegistry,
    ) -> Self {
        Self {
            api,
            scope,
            rules,
            config,
            metrics: SweepMetrics::new(),
            guard: PassGuard::new(),
            passes: AtomicU64::new(0),
        }
    }

    pub fn metrics(&self) -> &SweepMetrics {
        &self.metrics
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// Run every rule once. Returns [`PassOutcome::Skipped`] without touching
    /// the cluster if a pass is already in progress.
    pub async fn run_pass(&self) -> PassOutcome {
        let Some(_permit) = self.guard.try_enter() else {
            warn!(scope = %self.scope, "Previous cleanup pass still running, skipping");
            self.metrics.record_pass_skipped();
            return PassOutcome::Skipped;
        };

        let pass_id = self.passes.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();

        debug!(
            pass_id,
            scope = %self.scope,
            rules = self.rules.len(),
            concurrent = self.config.concurrent_rules,
            "Starting cleanup pass"
        );

        let rules = if self.config.concurrent_rules {
            join_all(self.rules.iter().map(|rule| self.apply_rule(rule))).await
        } else {
            let mut reports = Vec::with_capacity(self.rules.len());
            for rule in self.rules.iter() {
                reports.push(self.apply_rule(rule).await);
            }
            reports
        };

        let report = PassReport {
            pass_id,
            dry_run: self.config.dry_run,
            duration: started.elapsed(),
            rules,
        };
        self.metrics
            .record_pass_completed(report.duration.as_millis() as u64);
        report.log();

        PassOutcome::Completed(report)
    }

    /// Fetch a fresh snapshot for `rule`, delete every match and report.
    pub async fn apply_rule(&self, rule: &CleanupRule) -> RuleReport {
        let mut report = RuleReport::new(rule.name());

        info!(rule = rule.name(), scope = %self.scope, "Cleaning up {}", rule.description);

        let pods = match self.api.list_pods(&self.scope).await {
            Ok(pods) => pods,
            Err(e) => {
                error!(
                    rule = rule.name(),
                    scope = %self.scope,
                    error = %e,
                    "Error listing pods"
                );
                self.metrics.record_list_failure();
                report.list_error = Some(e.to_string());
                return report;
            }
        };
        report.pods_listed = Some(pods.len());

        let matches: Vec<&PodSnapshot> = pods.iter().filter(|pod| rule.matches(pod)).collect();
        self.metrics.record_pods_matched(matches.len());

        for pod in matches {
            report.outcomes.push(self.delete(rule, pod).await);
        }

        debug!(
            rule = rule.name(),
            listed = pods.len(),
            matched = report.matched(),
            deleted = report.deleted(),
            failed = report.failed(),
            "Rule applied"
        );

        report
    }

    async fn delete(&self, rule: &CleanupRule, pod: &PodSnapshot) -> DeletionOutcome {
        let mut outcome = DeletionOutcome {
            namespace: pod.namespace.clone(),
            name: pod.name.clone(),
            rule: rule.name(),
            succeeded: true,
            dry_run: self.config.dry_run,
            error: None,
        };

        if self.config.dry_run {
            info!(
                rule = rule.name(),
                namespace = %pod.namespace,
                pod = %pod.name,
                phase = %pod.phase,
                reason = %pod.reason,
                "[DRY-RUN] Would delete pod"
            );
            self.metrics.record_dry_run_match();
            return outcome;
        }

        match self.api.delete_pod(&pod.namespace, &pod.name).await {
            Ok(()) => {
                info!(
                    rule = rule.name(),
                    namespace = %pod.namespace,
                    pod = %pod.name,
                    "Deleted pod"
                );
                self.metrics.record_deletion_succeeded();
            }
            Err(e) => {
                // Already gone, typically removed by an earlier rule this pass.
                if e.is_not_found() {
                    warn!(
                        rule = rule.name(),
                        namespace = %pod.namespace,
                        pod = %pod.name,
                        error = %e,
                        "Pod already deleted"
                    );
                } else {
                    error!(
                        rule = rule.name(),
                        namespace = %pod.namespace,
                        pod = %pod.name,
                        error = %e,
                        retry = %self.config.retry_policy,
                        "Error deleting pod"
                    );
                }
                self.metrics.record_deletion_failed();
                outcome.succeeded = false;
                outcome.error = Some(e.to_string());
            }
        }

        outcome
    }
}
