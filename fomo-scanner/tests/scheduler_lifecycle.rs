//! Refresh loop lifecycle under paused tokio time.
//!
//! The runtime auto-advances the clock whenever every task is idle, so the
//! elapsed `Instant` between events is exactly the scheduled wait.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_test::assert_ok;

use fomo_scanner::clock::ManualClock;
use fomo_scanner::data::DataSource;
use fomo_scanner::scheduler::{CycleOutcome, RefreshEvent, SchedulerState};
use fomo_scanner::ScannerService;

use common::{record, test_config, MockSource};

fn service(source: &Arc<MockSource>) -> ScannerService {
    let source: Arc<dyn DataSource> = source.clone();
    ScannerService::with_source(test_config(), source, Arc::new(ManualClock::default()))
}

fn two_assets() -> Arc<MockSource> {
    MockSource::with_records(vec![record("alpha", 6_000_000.0), record("beta", 3_000_000.0)])
}

async fn next_event(events: &mut broadcast::Receiver<RefreshEvent>) -> RefreshEvent {
    events.recv().await.expect("event channel closed")
}

#[tokio::test(start_paused = true)]
async fn test_first_refresh_waits_for_initial_delay() {
    let source = two_assets();
    let service = service(&source);
    let scheduler = service.scheduler().clone();
    let mut events = scheduler.subscribe();

    let started = Instant::now();
    let handle = scheduler.start();

    assert_eq!(next_event(&mut events).await, RefreshEvent::Started);
    match next_event(&mut events).await {
        RefreshEvent::Refreshed {
            count,
            generation_id,
            run_id,
        } => {
            assert_eq!(count, 2);
            assert_eq!(generation_id, 1);
            assert!(!run_id.is_empty());
        }
        other => panic!("unexpected event: {:?}", other),
    }

    assert_eq!(started.elapsed(), Duration::from_secs(7));
    assert_eq!(source.pages(), 1);
    assert_eq!(scheduler.state().await, SchedulerState::Running);
    assert_eq!(service.cache().stats().count, 2);

    scheduler.stop();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_refreshes_repeat_on_interval() {
    let source = two_assets();
    let service = service(&source);
    let scheduler = service.scheduler().clone();
    let mut events = scheduler.subscribe();
    let handle = scheduler.start();

    next_event(&mut events).await;
    assert!(matches!(next_event(&mut events).await, RefreshEvent::Refreshed { .. }));
    let first = Instant::now();

    match next_event(&mut events).await {
        RefreshEvent::Refreshed { generation_id, .. } => assert_eq!(generation_id, 2),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(first.elapsed(), Duration::from_secs(180));
    assert_eq!(source.pages(), 2);

    scheduler.stop();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failures_use_error_backoff() {
    let source = two_assets();
    source.set_failing(true);
    let service = service(&source);
    let scheduler = service.scheduler().clone();
    let mut events = scheduler.subscribe();
    let handle = scheduler.start();

    next_event(&mut events).await;
    assert!(matches!(next_event(&mut events).await, RefreshEvent::Failed { .. }));
    let first = Instant::now();

    match next_event(&mut events).await {
        RefreshEvent::Failed { error, .. } => assert!(error.contains("market pages")),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(first.elapsed(), Duration::from_secs(60));

    let status = scheduler.status().await;
    assert_eq!(status.consecutive_failures, 2);
    assert!(status.last_error.is_some());
    assert!(status.last_success.is_none());
    assert!(service.cache().get_next().is_none());

    // Recovery resets the failure streak
    source.set_failing(false);
    assert!(matches!(next_event(&mut events).await, RefreshEvent::Refreshed { .. }));
    assert_eq!(scheduler.status().await.consecutive_failures, 0);

    scheduler.stop();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_empty_result_keeps_generation() {
    let source = two_assets();
    let service = service(&source);
    let scheduler = service.scheduler().clone();
    let mut events = scheduler.subscribe();
    let handle = scheduler.start();

    next_event(&mut events).await;
    assert!(matches!(next_event(&mut events).await, RefreshEvent::Refreshed { .. }));
    let cache = service.cache();
    let before = cache.snapshot();
    let generation = cache.stats().generation_id;

    source.set_records(Vec::new());
    let empty_at = Instant::now();
    assert!(matches!(next_event(&mut events).await, RefreshEvent::EmptyResult { .. }));
    assert_eq!(empty_at.elapsed(), Duration::from_secs(180));

    assert_eq!(cache.snapshot(), before);
    assert_eq!(cache.stats().generation_id, generation);

    scheduler.stop();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_initial_delay() {
    let source = two_assets();
    let service = service(&source);
    let scheduler = service.scheduler().clone();
    let mut events = scheduler.subscribe();
    let handle = scheduler.start();

    assert_eq!(next_event(&mut events).await, RefreshEvent::Started);
    scheduler.stop();
    assert_eq!(next_event(&mut events).await, RefreshEvent::Stopped);
    handle.await.unwrap();

    assert_eq!(source.pages(), 0);
    assert_eq!(scheduler.state().await, SchedulerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_interval_sleep() {
    let source = two_assets();
    let service = service(&source);
    let scheduler = service.scheduler().clone();
    let mut events = scheduler.subscribe();
    let handle = scheduler.start();

    next_event(&mut events).await;
    assert!(matches!(next_event(&mut events).await, RefreshEvent::Refreshed { .. }));

    let stopping = Instant::now();
    scheduler.stop();
    assert_eq!(next_event(&mut events).await, RefreshEvent::Stopped);
    handle.await.unwrap();

    assert!(stopping.elapsed() < Duration::from_secs(180));
    assert_eq!(source.pages(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_page_fails_after_call_timeout() {
    let source = two_assets();
    source.set_page_delay(Duration::from_secs(1_000));
    let service = service(&source);
    let scheduler = service.scheduler().clone();
    let mut events = scheduler.subscribe();

    let started = Instant::now();
    let handle = scheduler.start();

    next_event(&mut events).await;
    match next_event(&mut events).await {
        RefreshEvent::Failed { error, .. } => assert!(error.contains("market pages")),
        other => panic!("unexpected event: {:?}", other),
    }
    // 7 s initial delay plus the 10 s per-call bound
    assert_eq!(started.elapsed(), Duration::from_secs(17));

    scheduler.stop();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cycle_timeout_fails_the_cycle() {
    let source = two_assets();
    source.set_page_delay(Duration::from_secs(1_000));
    let mut config = test_config();
    config.scanner.batch.call_timeout_secs = 120;
    let dyn_source: Arc<dyn DataSource> = source.clone();
    let service = ScannerService::with_source(config, dyn_source, Arc::new(ManualClock::default()));
    let scheduler = service.scheduler().clone();
    let mut events = scheduler.subscribe();

    let started = Instant::now();
    let handle = scheduler.start();

    next_event(&mut events).await;
    match next_event(&mut events).await {
        RefreshEvent::Failed { error, .. } => assert_eq!(error, "Operation timed out"),
        other => panic!("unexpected event: {:?}", other),
    }
    // 7 s initial delay plus the 30 s cycle bound
    assert_eq!(started.elapsed(), Duration::from_secs(37));

    scheduler.stop();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_forced_refreshes_are_serialized() {
    let source = two_assets();
    source.set_page_delay(Duration::from_secs(5));
    let service = service(&source);
    let scheduler = service.scheduler();

    let started = Instant::now();
    let (a, b) = tokio::join!(scheduler.force_refresh(), scheduler.force_refresh());

    assert!(a && b);
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_eq!(service.cache().stats().generation_id, 2);
    assert_eq!(scheduler.status().await.cycles_completed, 2);
}

#[tokio::test]
async fn test_refresh_once_reports_outcome() {
    let source = two_assets();
    let service = service(&source);
    let scheduler = service.scheduler();

    let published = assert_ok!(scheduler.refresh_once().await);
    assert_eq!(published, CycleOutcome::Published { count: 2 });

    source.set_records(Vec::new());
    let empty = assert_ok!(scheduler.refresh_once().await);
    assert_eq!(empty, CycleOutcome::Empty);
    assert!(!scheduler.force_refresh().await);
    assert_eq!(scheduler.state().await, SchedulerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_bad_listen_address_never_starts_the_loop() {
    let source = two_assets();
    let mut config = test_config();
    config.server.enabled = true;
    config.server.host = "not-an-address".into();

    let dyn_source: Arc<dyn DataSource> = source.clone();
    let service = ScannerService::with_source(config, dyn_source, Arc::new(ManualClock::default()));
    let scheduler = service.scheduler().clone();

    let err = service.run(std::future::pending()).await.unwrap_err();
    assert!(err.to_string().contains("Invalid server host"));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(scheduler.state().await, SchedulerState::Idle);
    assert_eq!(source.pages(), 0);
}
