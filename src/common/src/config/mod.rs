use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::cluster::Scope;
use crate::selector::LabelSelector;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "podsweep.toml";

/// Prefix for environment overrides, e.g. `PODSWEEP__SCOPE__NAMESPACE`.
pub const ENV_PREFIX: &str = "PODSWEEP__";

/// How to reach the cluster API.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Explicit kubeconfig file. When unset the client configuration is
    /// inferred (`KUBECONFIG`, `~/.kube/config`, in-cluster service account).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,
    /// Upper bound for every list or delete call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Per-rule enable switches. All rules are on by default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesConfig {
    pub evicted: bool,
    pub crash_loop_back_off: bool,
    pub image_pull_back_off: bool,
    pub failed: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            evicted: true,
            crash_loop_back_off: true,
            image_pull_back_off: true,
            failed: true,
        }
    }
}

impl RulesConfig {
    pub fn any_enabled(&self) -> bool {
        self.evicted || self.crash_loop_back_off || self.image_pull_back_off || self.failed
    }
}

/// What happens to a pod whose deletion failed.
///
/// `NextTick` is the only policy: nothing is retried within a pass, the pod
/// is simply picked up again by the next scheduled pass if it still matches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    #[default]
    NextTick,
}

impl std::fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryPolicy::NextTick => f.write_str("next_tick"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Period between cleanup passes
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// Log matching pods without deleting them
    pub dry_run: bool,
    /// Run the rules of one pass concurrently instead of one after another
    pub concurrent_rules: bool,
    pub retry_policy: RetryPolicy,
    pub rules: RulesConfig,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            dry_run: false,
            concurrent_rules: false,
            retry_policy: RetryPolicy::default(),
            rules: RulesConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub cluster: ClusterConfig,
    /// Namespace and label selector applied to every rule
    pub scope: Scope,
    pub sweeper: SweeperConfig,
}

impl Configuration {
    /// Load defaults, then `podsweep.toml` if present, then environment.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(DEFAULT_CONFIG_FILE))
            .extract()
            .map_err(Box::new)
    }

    /// Same as [`Configuration::load`] with an explicit file, which must exist.
    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!("Configuration file not found: {}", path.display());
        }
        Self::figment(Toml::file(path))
            .extract()
            .with_context(|| format!("Failed to parse configuration from {}", path.display()))
    }

    fn figment(file: figment::providers::Data<Toml>) -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject configurations the sweeper cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sweeper.tick_interval.is_zero() {
            anyhow::bail!("sweeper.tick_interval must be positive");
        }

        if self.cluster.request_timeout.is_zero() {
            anyhow::bail!("cluster.request_timeout must be positive");
        }

        if self.cluster.connect_timeout.is_zero() {
            anyhow::bail!("cluster.connect_timeout must be positive");
        }

        if !self.sweeper.rules.any_enabled() {
            anyhow::bail!("at least one cleanup rule must be enabled in sweeper.rules");
        }

        LabelSelector::parse(&self.scope.label_selector).with_context(|| {
            format!(
                "scope.label_selector '{}' is not a valid label selector",
                self.scope.label_selector
            )
        })?;

        Ok(())
    }
}
