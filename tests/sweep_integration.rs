use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use common::cli::{CommonArgs, CommonCommands, utils};
use common::config::Configuration;
use common::testing::{InMemoryPodApi, PodBuilder};
use sweeper::{CountedTicker, IntervalTicker, Scheduler, Sweeper};
use tokio::sync::watch;

fn mixed_cluster() -> Arc<InMemoryPodApi> {
    Arc::new(InMemoryPodApi::with_pods([
        PodBuilder::new("a", "p1").failed("Evicted").build(),
        PodBuilder::new("a", "p2").running().ready("app").build(),
        PodBuilder::new("a", "p3")
            .waiting("app", "CrashLoopBackOff")
            .build(),
        PodBuilder::new("b", "p4")
            .pending()
            .waiting("app", "ImagePullBackOff")
            .build(),
        PodBuilder::new("b", "p5").failed("OOMKilled").build(),
    ]))
}

fn sweeper_for(cluster: Arc<InMemoryPodApi>, config: &Configuration) -> Arc<Sweeper> {
    Arc::new(Sweeper::new(
        cluster,
        config.scope.clone(),
        config.sweeper.clone(),
    ))
}

#[tokio::test]
async fn test_config_file_scopes_the_sweep() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[scope]
namespace = "a"

[sweeper]
tick_interval = "5s"

[sweeper.rules]
crash_loop_back_off = false
"#
    )
    .unwrap();

    let config = Configuration::load_from_path(file.path()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.sweeper.tick_interval, Duration::from_secs(5));

    let cluster = mixed_cluster();
    let sweeper = sweeper_for(cluster.clone(), &config);
    let outcome = sweeper.run_pass().await;
    let report = outcome.report().unwrap();

    assert_eq!(report.rules.len(), 3);
    assert_eq!(cluster.deleted().await, vec!["a/p1"]);
    assert_eq!(
        cluster.pod_names().await,
        vec!["a/p2", "a/p3", "b/p4", "b/p5"]
    );
}

#[tokio::test]
async fn test_cluster_wide_sweep_is_idempotent() {
    let cluster = mixed_cluster();
    let sweeper = sweeper_for(cluster.clone(), &Configuration::default());

    let first = sweeper.run_pass().await;
    assert_eq!(first.report().unwrap().deleted(), 4);
    assert_eq!(cluster.pod_names().await, vec!["a/p2"]);

    let second = sweeper.run_pass().await;
    let report = second.report().unwrap();
    assert_eq!(report.attempted(), 0);
    assert_eq!(cluster.delete_calls().await.len(), 4);
}

#[tokio::test]
async fn test_failed_listing_is_retried_on_next_tick() {
    let cluster = mixed_cluster();
    // every rule of the first pass fails to list
    cluster.fail_next_lists(4).await;
    let sweeper = sweeper_for(cluster.clone(), &Configuration::default());
    let (_tx, rx) = watch::channel(false);

    let passes = Scheduler::new(sweeper.clone())
        .run(CountedTicker::new(2), rx)
        .await;

    assert_eq!(passes, 2);
    assert_eq!(cluster.pod_names().await, vec!["a/p2"]);
    let summary = sweeper.metrics().summary();
    assert_eq!(summary.list_failures, 4);
    assert_eq!(summary.deletions_succeeded, 4);
}

#[tokio::test(start_paused = true)]
async fn test_pods_appearing_between_ticks_are_swept() {
    let cluster = Arc::new(InMemoryPodApi::new());
    let sweeper = sweeper_for(cluster.clone(), &Configuration::default());
    let (tx, rx) = watch::channel(false);

    let task = tokio::spawn({
        let sweeper = sweeper.clone();
        async move {
            Scheduler::new(sweeper)
                .run(IntervalTicker::new(Duration::from_secs(10)), rx)
                .await
        }
    });

    tokio::time::sleep(Duration::from_secs(15)).await;
    cluster
        .add_pod(PodBuilder::new("c", "late").failed("Evicted").build())
        .await;
    assert!(cluster.deleted().await.is_empty());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(cluster.deleted().await, vec!["c/late"]);

    tx.send(true).unwrap();
    assert_eq!(task.await.unwrap(), 2);
}

#[tokio::test]
async fn test_command_line_dry_run_override() {
    let args = CommonArgs::try_parse_from([
        "podsweep",
        "--namespace",
        "b",
        "--dry-run",
        "once",
    ])
    .unwrap();
    assert_eq!(args.command, Some(CommonCommands::Once));

    let mut config = Configuration::default();
    utils::apply_overrides(&mut config, &args);

    let cluster = mixed_cluster();
    let sweeper = sweeper_for(cluster.clone(), &config);
    let outcome = sweeper.run_pass().await;

    assert_eq!(outcome.report().unwrap().matched(), 2);
    assert!(cluster.delete_calls().await.is_empty());
    assert_eq!(sweeper.metrics().dry_run_matches(), 2);
}
