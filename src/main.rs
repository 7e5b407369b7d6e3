//! podsweep: deletes evicted, crash-looping, image-pull-failing and failed
//! pods on a fixed interval.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use common::cli::{CommonArgs, CommonCommands, utils};
use common::cluster::KubePodApi;
use sweeper::{IntervalTicker, PassOutcome, Scheduler, Sweeper};
use tokio::sync::watch;

/// Waits for a shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => tracing::info!("Received SIGINT"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        tracing::info!("Received Ctrl+C");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommonArgs::parse();

    utils::init_logging(&args);

    let mut config = utils::load_config(args.config.as_ref())?;
    utils::apply_overrides(&mut config, &args);

    let command = args.command.clone().unwrap_or_default();
    if utils::handle_common_command(&command, &config)? {
        return Ok(());
    }

    config.validate().context("Invalid configuration")?;

    // An unreachable API server at startup is fatal; later failures are not.
    let api = KubePodApi::connect(&config.cluster)
        .await
        .context("Failed to connect to Kubernetes")?;

    let sweeper = Arc::new(Sweeper::new(
        Arc::new(api),
        config.scope.clone(),
        config.sweeper.clone(),
    ));

    if config.sweeper.dry_run {
        tracing::warn!("Dry-run mode: matching pods are logged, not deleted");
    }

    if command == CommonCommands::Once {
        if let PassOutcome::Completed(report) = sweeper.run_pass().await {
            for rule in &report.rules {
                match &rule.list_error {
                    Some(error) => println!("{:<22} list failed: {error}", rule.rule),
                    None => println!(
                        "{:<22} matched={} deleted={} failed={}",
                        rule.rule,
                        rule.matched(),
                        rule.deleted(),
                        rule.failed()
                    ),
                }
            }
        }
        return Ok(());
    }

    tracing::info!(
        tick_interval = ?config.sweeper.tick_interval,
        scope = %config.scope,
        "Starting pod sweeper"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ticker = IntervalTicker::new(config.sweeper.tick_interval);
    let sweep_task = {
        let scheduler = Scheduler::new(sweeper.clone());
        tokio::spawn(async move { scheduler.run(ticker, shutdown_rx).await })
    };

    wait_for_shutdown_signal().await?;

    tracing::info!("Received shutdown signal, stopping pod sweeper");
    // Receiver may already be gone if the task ended
    let _ = shutdown_tx.send(true);

    let passes = sweep_task.await.context("Sweeper task panicked")?;
    sweeper.metrics().summary().log();
    tracing::info!(passes, "Pod sweeper stopped");

    Ok(())
}
