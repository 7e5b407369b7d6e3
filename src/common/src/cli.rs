use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line of the `podsweep` binary
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,

    #[arg(long, help = "Path to the kubeconfig file")]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        help = "Namespace to clean up (leave empty for all namespaces)"
    )]
    pub namespace: Option<String>,

    #[arg(
        long,
        help = "Label selector to filter pods (leave empty for all pods)"
    )]
    pub label_selector: Option<String>,

    #[arg(long, help = "Log matching pods without deleting them")]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<CommonCommands>,
}

#[derive(Subcommand, Debug, Clone, Default, PartialEq, Eq)]
pub enum CommonCommands {
    /// Run cleanup passes until interrupted (default behavior)
    #[default]
    Start,
    /// Run a single cleanup pass and exit
    Once,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Install the global tracing subscriber.
    ///
    /// `RUST_LOG` takes precedence; otherwise `--quiet` and `--verbose`
    /// select the level.
    pub fn init_logging(args: &CommonArgs) {
        let level = if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path)
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Flags given on the command line win over file and environment.
    pub fn apply_overrides(config: &mut Configuration, args: &CommonArgs) {
        if let Some(kubeconfig) = &args.kubeconfig {
            config.cluster.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(namespace) = &args.namespace {
            config.scope.namespace = namespace.clone();
        }
        if let Some(label_selector) = &args.label_selector {
            config.scope.label_selector = label_selector.clone();
        }
        if args.dry_run {
            config.sweeper.dry_run = true;
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("podsweep Configuration:");
            println!("=======================");
            match &config.cluster.kubeconfig {
                Some(path) => println!("Kubeconfig: {}", path.display()),
                None => println!("Kubeconfig: <inferred>"),
            }
            println!("Request timeout: {:?}", config.cluster.request_timeout);
            println!("Connect timeout: {:?}", config.cluster.connect_timeout);
            println!("Scope: {}", config.scope);
            println!("Tick interval: {:?}", config.sweeper.tick_interval);
            println!("Dry run: {}", config.sweeper.dry_run);
            println!("Concurrent rules: {}", config.sweeper.concurrent_rules);
            println!("Retry policy: {}", config.sweeper.retry_policy);

            let rules = &config.sweeper.rules;
            println!("Rules:");
            println!("  evicted: {}", rules.evicted);
            println!("  crash-loop-back-off: {}", rules.crash_loop_back_off);
            println!("  image-pull-back-off: {}", rules.image_pull_back_off);
            println!("  failed: {}", rules.failed);
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        tracing::info!("Validating configuration...");
        config.validate()?;
        tracing::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle commands that don't need a cluster connection.
    ///
    /// Returns `true` when the command was fully handled here.
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                Ok(true)
            }
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(true)
            }
            CommonCommands::Start | CommonCommands::Once => Ok(false),
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    #[test]
    fn test_common_commands_default() {
        assert_eq!(CommonCommands::default(), CommonCommands::Start);
    }

    #[test]
    fn test_version_info() {
        let version = utils::version_info();
        assert!(version.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_parse_cluster_flags() {
        let args = CommonArgs::try_parse_from([
            "podsweep",
            "--namespace",
            "batch",
            "--label-selector",
            "app=worker",
            "--kubeconfig",
            "/tmp/kubeconfig",
            "--dry-run",
            "once",
        ])
        .unwrap();

        assert_eq!(args.namespace.as_deref(), Some("batch"));
        assert_eq!(args.label_selector.as_deref(), Some("app=worker"));
        assert_eq!(args.kubeconfig, Some(PathBuf::from("/tmp/kubeconfig")));
        assert!(args.dry_run);
        assert_eq!(args.command, Some(CommonCommands::Once));
    }

    #[test]
    fn test_overrides_win_over_configuration() {
        let mut config = Configuration::default();
        config.scope.namespace = "from-file".to_string();

        let args = CommonArgs::try_parse_from([
            "podsweep",
            "--namespace",
            "",
            "--label-selector",
            "tier=batch",
        ])
        .unwrap();
        utils::apply_overrides(&mut config, &args);

        assert!(config.scope.namespace.is_empty(), "empty flag selects all namespaces");
        assert_eq!(config.scope.label_selector, "tier=batch");
        assert!(!config.sweeper.dry_run);
    }

    #[test]
    fn test_absent_flags_keep_configuration() {
        let mut config = Configuration::default();
        config.scope.namespace = "from-file".to_string();

        let args = CommonArgs::try_parse_from(["podsweep"]).unwrap();
        utils::apply_overrides(&mut config, &args);

        assert_eq!(config.scope.namespace, "from-file");
        assert!(args.command.is_none());
    }

    #[test]
    fn test_config_and_validate_are_handled_locally() {
        let config = Configuration::default();
        assert!(utils::handle_common_command(&CommonCommands::Validate, &config).unwrap());
        assert!(!utils::handle_common_command(&CommonCommands::Once, &config).unwrap());
        assert!(!utils::handle_common_command(&CommonCommands::Start, &config).unwrap());
    }
}
