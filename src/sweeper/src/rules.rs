//! Cleanup rules as data.
//!
//! A rule is a name plus a predicate over a [`PodSnapshot`]. The executor
//! owns the shared fetch, filter, delete and log driver, so adding a rule is a
//! single [`RuleRegistry::register`] call.

use std::fmt;

use common::config::RulesConfig;
use common::{PodPhase, PodSnapshot};

pub const EVICTED_REASON: &str = "Evicted";
pub const CRASH_LOOP_BACK_OFF: &str = "CrashLoopBackOff";
pub const IMAGE_PULL_BACK_OFF: &str = "ImagePullBackOff";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("a rule named '{0}' is already registered")]
    DuplicateName(&'static str),

    #[error("rule name must not be empty")]
    EmptyName,
}

/// The built-in rules, each switchable in `[sweeper.rules]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Evicted,
    CrashLoopBackOff,
    ImagePullBackOff,
    Failed,
}

impl RuleKind {
    pub const fn name(&self) -> &'static str {
        match self {
            RuleKind::Evicted => "evicted",
            RuleKind::CrashLoopBackOff => "crash-loop-back-off",
            RuleKind::ImagePullBackOff => "image-pull-back-off",
            RuleKind::Failed => "failed",
        }
    }

    fn enabled_in(&self, config: &RulesConfig) -> bool {
        match self {
            RuleKind::Evicted => config.evicted,
            RuleKind::CrashLoopBackOff => config.crash_loop_back_off,
            RuleKind::ImagePullBackOff => config.image_pull_back_off,
            RuleKind::Failed => config.failed,
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named predicate selecting pods for deletion.
///
/// The name identifies the rule in logs and reports and is unique within a
/// [`RuleRegistry`].
#[derive(Clone, Copy)]
pub struct CleanupRule {
    pub name: &'static str,
    pub description: &'static str,
    predicate: fn(&PodSnapshot) -> bool,
}

impl CleanupRule {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        predicate: fn(&PodSnapshot) -> bool,
    ) -> Self {
        Self {
            name,
            description,
            predicate,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn matches(&self, pod: &PodSnapshot) -> bool {
        (self.predicate)(pod)
    }
}

impl fmt::Debug for CleanupRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupRule")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

pub fn is_evicted(pod: &PodSnapshot) -> bool {
    pod.phase == PodPhase::Failed && pod.reason == EVICTED_REASON
}

pub fn is_crash_looping(pod: &PodSnapshot) -> bool {
    pod.has_container_waiting_with(CRASH_LOOP_BACK_OFF)
}

pub fn is_image_pull_failing(pod: &PodSnapshot) -> bool {
    pod.has_container_waiting_with(IMAGE_PULL_BACK_OFF)
}

/// Failed for any reason other than eviction; evicted pods belong to
/// [`is_evicted`] so the two rules never both select a pod.
pub fn is_failed(pod: &PodSnapshot) -> bool {
    pod.phase == PodPhase::Failed && pod.reason != EVICTED_REASON
}

const BUILTIN_RULES: [(RuleKind, CleanupRule); 4] = [
    (
        RuleKind::Evicted,
        CleanupRule::new(RuleKind::Evicted.name(), "evicted pods", is_evicted),
    ),
    (
        RuleKind::CrashLoopBackOff,
        CleanupRule::new(
            RuleKind::CrashLoopBackOff.name(),
            "pods in CrashLoopBackOff state",
            is_crash_looping,
        ),
    ),
    (
        RuleKind::ImagePullBackOff,
        CleanupRule::new(
            RuleKind::ImagePullBackOff.name(),
            "pods with ImagePullBackOff",
            is_image_pull_failing,
        ),
    ),
    (
        RuleKind::Failed,
        CleanupRule::new(RuleKind::Failed.name(), "pods in Failed state", is_failed),
    ),
];

/// Ordered set of uniquely named rules a pass applies.
#[derive(Clone, Debug)]
pub struct RuleRegistry {
    rules: Vec<CleanupRule>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleRegistry {
    /// All four rules in pass order: evicted, crash-loop, image-pull, failed.
    pub fn builtin() -> Self {
        Self::from_config(&RulesConfig::default())
    }

    /// Built-in rules minus the ones switched off in configuration.
    pub fn from_config(config: &RulesConfig) -> Self {
        Self {
            rules: BUILTIN_RULES
                .iter()
                .filter(|(kind, _)| kind.enabled_in(config))
                .map(|(_, rule)| *rule)
                .collect(),
        }
    }

    /// Append a rule after the existing ones. Names must be unique so every
    /// deletion stays attributable to exactly one rule.
    pub fn register(&mut self, rule: CleanupRule) -> Result<(), RuleError> {
        if rule.name.is_empty() {
            return Err(RuleError::EmptyName);
        }
        if self.get(rule.name).is_some() {
            return Err(RuleError::DuplicateName(rule.name));
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CleanupRule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CleanupRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Names of every rule that would select `pod`.
    pub fn classify(&self, pod: &PodSnapshot) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(pod))
            .map(|rule| rule.name)
            .collect()
    }
}
