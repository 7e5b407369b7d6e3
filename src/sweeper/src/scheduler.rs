//! Periodic driver for cleanup passes.
//!
//! The scheduler waits for a tick, runs one pass, logs the accumulated
//! metrics and waits again. Passes never overlap: the loop awaits each pass
//! before asking for the next tick, ticks that fall due meanwhile are
//! skipped, and the sweeper's own guard refuses re-entry from any other
//! caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use crate::executor::{PassOutcome, Sweeper};

/// Source of pass triggers.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. `false` means the ticker is exhausted.
    async fn tick(&mut self) -> bool;
}

/// Fixed-period ticker. The first tick fires one period after creation.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Fires immediately a fixed number of times, then stops.
#[derive(Debug, Clone)]
pub struct CountedTicker {
    remaining: usize,
}

impl CountedTicker {
    pub fn new(ticks: usize) -> Self {
        Self { remaining: ticks }
    }
}

#[async_trait]
impl Ticker for CountedTicker {
    async fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        tokio::task::yield_now().await;
        true
    }
}

pub struct Scheduler {
    sweeper: Arc<Sweeper>,
}

impl Scheduler {
    pub fn new(sweeper: Arc<Sweeper>) -> Self {
        Self { sweeper }
    }

    /// Run passes on every tick until the ticker is exhausted or `shutdown`
    /// flips to `true` (or its sender is dropped). A pass in progress is
    /// allowed to finish. Returns the number of completed passes.
    pub async fn run<T: Ticker>(
        &self,
        mut ticker: T,
        mut shutdown: watch::Receiver<bool>,
    ) -> usize {
        let mut completed = 0;

        info!(
            scope = %self.sweeper.scope(),
            rules = self.sweeper.rules().len(),
            "Pod sweeper started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let ticked = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                ticked = ticker.tick() => ticked,
            };

            if !ticked {
                debug!("Ticker exhausted");
                break;
            }

            debug!("Running cleanup pass");
            if let PassOutcome::Completed(_) = self.sweeper.run_pass().await {
                completed += 1;
            }
            self.sweeper.metrics().summary().log();
        }

        info!(passes = completed, "Pod sweeper stopped");
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Scope;
    use common::config::SweeperConfig;
    use common::testing::{InMemoryPodApi, PodBuilder};

    fn sweeper(cluster: Arc<InMemoryPodApi>) -> Arc<Sweeper> {
        Arc::new(Sweeper::new(
            cluster,
            Scope::cluster_wide(),
            SweeperConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_runs_one_pass_per_tick() {
        let cluster = Arc::new(InMemoryPodApi::with_pods([PodBuilder::new("a", "p1")
            .failed("Evicted")
            .build()]));
        let sweeper = sweeper(cluster.clone());
        let (_tx, rx) = watch::channel(false);

        let passes = Scheduler::new(sweeper.clone())
            .run(CountedTicker::new(3), rx)
            .await;

        assert_eq!(passes, 3);
        assert_eq!(cluster.list_calls().await.len(), 12);
        // deleted on the first pass, later passes find nothing
        assert_eq!(cluster.delete_calls().await.len(), 1);
        assert_eq!(sweeper.metrics().passes_completed(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_before_first_tick() {
        let cluster = Arc::new(InMemoryPodApi::new());
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let passes = Scheduler::new(sweeper(cluster.clone()))
            .run(CountedTicker::new(5), rx)
            .await;

        assert_eq!(passes, 0);
        assert!(cluster.list_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_sender_stops_scheduler() {
        let cluster = Arc::new(InMemoryPodApi::new());
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let passes = Scheduler::new(sweeper(cluster))
            .run(IntervalTicker::new(Duration::from_secs(3600)), rx)
            .await;

        assert_eq!(passes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticker_waits_one_period_first() {
        let start = Instant::now();
        let mut ticker = IntervalTicker::new(Duration::from_secs(10));

        assert!(ticker.tick().await);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert!(ticker.tick().await);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(ticker.period(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_scheduler_until_shutdown() {
        let cluster = Arc::new(InMemoryPodApi::new());
        let sweeper = sweeper(cluster.clone());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn({
            let sweeper = sweeper.clone();
            async move {
                Scheduler::new(sweeper)
                    .run(IntervalTicker::new(Duration::from_secs(10)), rx)
                    .await
            }
        });

        tokio::time::sleep(Duration::from_secs(25)).await;
        tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), 2);
        assert_eq!(cluster.list_calls().await.len(), 8);
    }

    #[tokio::test]
    async fn test_counted_ticker_exhausts() {
        let mut ticker = CountedTicker::new(2);
        assert!(ticker.tick().await);
        assert!(ticker.tick().await);
        assert!(!ticker.tick().await);
    }
}
