//! Integration Tests for the load generation engine
//!
//! These run the full scheduler/group/session stack against an in-memory
//! frontend with tokio's clock paused, so minutes of simulated load take
//! milliseconds.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use mecha_loadgen::group::GroupSpawner;
use mecha_loadgen::pool::AdmissionPool;
use mecha_loadgen::runner::SessionRunner;
use mecha_loadgen::{LoadEngine, Phase, RunStats, StatsSnapshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

mod common;
use common::*;

fn start(engine: &Arc<LoadEngine>) -> JoinHandle<StatsSnapshot> {
    let engine = engine.clone();
    tokio::spawn(async move { engine.run().await })
}

// ============================================================================
// Scheduler
// ============================================================================

mod scheduler {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_immediate_cancel_launches_no_group() {
        let service = Arc::new(MockClientService::new());
        let engine = LoadEngine::new(&test_config(), service.clone());

        engine.coordinator().trigger("test");
        let snapshot = engine.run().await;

        assert_eq!(snapshot.tokens_acquired, 0);
        assert_eq!(snapshot.groups_started, 0);
        assert!(service.creates().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enters_rest_once_then_resumes_simulate() {
        let service = Arc::new(MockClientService::new());
        let engine = Arc::new(LoadEngine::new(&test_config(), service));
        let phase = engine.phase();
        let run = start(&engine);

        sleep(Duration::from_secs(100)).await;
        assert_eq!(*phase.borrow(), Phase::Simulate);
        assert_eq!(engine.stats().snapshot().rest_periods, 0);

        // Rest starts after the first delay wait that ends past 180s
        sleep(Duration::from_secs(150)).await;
        assert_eq!(*phase.borrow(), Phase::Rest);
        assert_eq!(engine.stats().snapshot().rest_periods, 1);
        let started_before_rest_ended = engine.stats().snapshot().groups_started;

        // 120s later the reference timestamp is reset and groups launch again
        sleep(Duration::from_secs(150)).await;
        assert_eq!(*phase.borrow(), Phase::Simulate);
        let snapshot = engine.stats().snapshot();
        assert_eq!(snapshot.rest_periods, 1);
        assert!(snapshot.groups_started > started_before_rest_ended);

        engine.coordinator().trigger("test");
        run.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_groups_launched_while_resting() {
        let service = Arc::new(MockClientService::new());
        let engine = Arc::new(LoadEngine::new(&test_config(), service));
        let run = start(&engine);

        sleep(Duration::from_secs(230)).await;
        assert_eq!(*engine.phase().borrow(), Phase::Rest);
        let during_rest = engine.stats().snapshot().groups_started;

        sleep(Duration::from_secs(60)).await;
        assert_eq!(*engine.phase().borrow(), Phase::Rest);
        assert_eq!(engine.stats().snapshot().groups_started, during_rest);

        engine.coordinator().trigger("test");
        run.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_launching_groups() {
        let service = Arc::new(MockClientService::new());
        let engine = Arc::new(LoadEngine::new(&test_config(), service.clone()));
        let run = start(&engine);

        sleep(Duration::from_secs(45)).await;
        engine.coordinator().trigger("test");
        let snapshot = run.await.unwrap();

        sleep(Duration::from_secs(60)).await;
        assert_eq!(engine.stats().snapshot().groups_started, snapshot.groups_started);
        assert_eq!(
            service.creates().len() as u64,
            snapshot.groups_started * test_config().server_max_players as u64
        );
    }
}

// ============================================================================
// Admission and token accounting
// ============================================================================

mod admission {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_active_groups_never_exceed_capacity() {
        let config = mecha_loadgen::Config {
            max_concurrent_groups: 2,
            server_max_players: 3,
            ..test_config()
        };
        let service = Arc::new(MockClientService::new());
        let engine = Arc::new(LoadEngine::new(&config, service.clone()));
        let run = start(&engine);

        sleep(Duration::from_secs(170)).await;
        engine.coordinator().trigger("test");
        let snapshot = run.await.unwrap();

        assert!(snapshot.groups_started > 2);
        assert_eq!(snapshot.peak_groups_active, 2);
        assert!(service.peak_open() <= 2 * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_are_conserved_across_a_run() {
        let service = Arc::new(MockClientService::new());
        let engine = Arc::new(LoadEngine::new(&test_config(), service));
        let run = start(&engine);

        sleep(Duration::from_secs(105)).await;
        engine.coordinator().trigger("test");
        let snapshot = run.await.unwrap();

        assert!(snapshot.tokens_acquired > 0);
        assert_eq!(snapshot.tokens_acquired, snapshot.tokens_released);
        assert_eq!(snapshot.groups_started, snapshot.groups_completed);
        assert_eq!(snapshot.groups_active, 0);
        assert_eq!(engine.pool().available(), engine.pool().capacity());
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_spawner_returns_one_token() {
        let config = test_config();
        let stats = Arc::new(RunStats::new());
        let service = Arc::new(MockClientService::new());
        let runner = Arc::new(SessionRunner::new(
            service.clone(),
            config.player_properties.clone(),
            config.session,
            stats.clone(),
        ));
        let spawner = GroupSpawner::new(runner, &config, stats.clone());
        let pool = AdmissionPool::new(1, Duration::from_secs(10), stats.clone());
        let cancel = CancellationToken::new();

        let token = pool.acquire(&cancel).await.unwrap();
        assert_eq!(pool.available(), 0);

        let report = spawner.run(token, &pool, &cancel).await;
        assert_eq!(pool.available(), 1);
        assert_eq!(report.outcomes.len(), config.server_max_players);
        assert_eq!(report.matched(), config.server_max_players);

        // Every member id is `{group}-{index}` and unique
        let ids: HashSet<_> = service.creates().into_iter().collect();
        assert_eq!(ids.len(), config.server_max_players);
        for index in 0..config.server_max_players {
            assert!(ids.contains(&format!("{}-{}", report.group_id, index)));
        }
        assert!(report.group_id.starts_with("loadtest-"));

        // The replacement token carries the recycle delay
        let token = pool.acquire(&cancel).await.unwrap();
        assert_eq!(token.delay(), config.group_recycle_delay);
    }
}

// ============================================================================
// Session failures
// ============================================================================

mod failures {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_error_still_deletes_every_session() {
        let service = Arc::new(MockClientService::failing_subscribe());
        let engine = Arc::new(LoadEngine::new(&test_config(), service.clone()));
        let run = start(&engine);

        sleep(Duration::from_secs(50)).await;
        engine.coordinator().trigger("test");
        let snapshot = run.await.unwrap();

        let created: HashSet<_> = service.creates().into_iter().collect();
        let deleted: Vec<_> = service.deletes();
        assert!(!created.is_empty());
        assert_eq!(deleted.len(), created.len(), "one delete per session");
        assert_eq!(deleted.into_iter().collect::<HashSet<_>>(), created);
        assert_eq!(snapshot.sessions_matched, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_frontend_keeps_engine_running() {
        let service = Arc::new(MockClientService::failing_create());
        let engine = Arc::new(LoadEngine::new(&test_config(), service.clone()));
        let run = start(&engine);

        sleep(Duration::from_secs(95)).await;
        engine.coordinator().trigger("test");
        let snapshot = run.await.unwrap();

        assert!(snapshot.groups_started > test_config().max_concurrent_groups as u64);
        assert_eq!(snapshot.sessions_failed, snapshot.sessions_started);
        assert_eq!(snapshot.connection_failures, snapshot.sessions_started);
        assert!(service.subscribes().is_empty());
        assert!(service.deletes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_results_are_not_failures() {
        for behavior in [StreamBehavior::Eof, StreamBehavior::Error, StreamBehavior::Hang] {
            let service = Arc::new(MockClientService::with_stream(behavior));
            let engine = Arc::new(LoadEngine::new(&test_config(), service.clone()));
            let run = start(&engine);

            sleep(Duration::from_secs(75)).await;
            engine.coordinator().trigger("test");
            let snapshot = run.await.unwrap();

            assert_eq!(snapshot.sessions_matched, 0, "{behavior:?}");
            assert_eq!(snapshot.sessions_failed, 0, "{behavior:?}");
            assert!(snapshot.sessions_unmatched > 0, "{behavior:?}");
            assert_eq!(
                snapshot.deletes_attempted,
                service.creates().len() as u64,
                "{behavior:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unblocks_stalled_sessions() {
        let service = Arc::new(MockClientService::with_stream(StreamBehavior::Hang));
        let engine = Arc::new(LoadEngine::new(&test_config(), service.clone()));
        let run = start(&engine);

        sleep(Duration::from_secs(15)).await;
        let cancelled_at = Instant::now();
        engine.coordinator().trigger("test");
        let snapshot = run.await.unwrap();

        // Exit waits out the grace period, and nothing had to be aborted
        let grace = test_config().shutdown_grace;
        assert!(cancelled_at.elapsed() >= grace);
        assert!(cancelled_at.elapsed() < grace + Duration::from_millis(100));
        assert_eq!(snapshot.groups_active, 0);
        assert_eq!(snapshot.tokens_acquired, snapshot.tokens_released);
        assert_eq!(snapshot.deletes_attempted, service.creates().len() as u64);
        assert!(service.deletes().len() < service.creates().len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failing_member_leaves_siblings_running() {
        let config = test_config();
        let stats = Arc::new(RunStats::new());
        let service = Arc::new(MockClientService::failing_create_for("-1"));
        let runner = Arc::new(SessionRunner::new(
            service.clone(),
            config.player_properties.clone(),
            config.session,
            stats.clone(),
        ));
        let spawner = GroupSpawner::new(runner, &config, stats.clone());
        let pool = AdmissionPool::new(1, Duration::from_secs(10), stats.clone());
        let cancel = CancellationToken::new();

        let token = pool.acquire(&cancel).await.unwrap();
        let report = spawner.run(token, &pool, &cancel).await;

        let failing = format!("{}-1", report.group_id);
        let siblings: HashSet<_> = (0..config.server_max_players)
            .map(|index| format!("{}-{}", report.group_id, index))
            .filter(|id| *id != failing)
            .collect();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.matched(), config.server_max_players - 1);
        assert_eq!(service.creates().len(), config.server_max_players);
        assert_eq!(service.deletes().into_iter().collect::<HashSet<_>>(), siblings);
        assert!(!service.deletes().contains(&failing));
        assert_eq!(
            service.subscribes().into_iter().collect::<HashSet<_>>(),
            siblings
        );

        // The group still hands back exactly one token
        assert_eq!(pool.available(), 1);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.tokens_released, 1);
        assert_eq!(snapshot.sessions_failed, 1);
        assert_eq!(snapshot.groups_completed, 1);
    }
}
