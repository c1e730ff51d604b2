//! Refresh scheduler scenarios against a memory store and scripted checker

mod helpers;

use chrono::{Duration as ChronoDuration, Utc};
use helpers::{plate, seeded_store, GatedChecker, ScriptedChecker};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use vpw_common::events::{EventBus, PlateEvent, RunOutcome};
use vpw_common::model::{CheckStatus, PlateRecord};
use vpw_common::Error;
use vpw_tracker::services::{AvailabilityCheck, RefreshScheduler, RemoteCheckError, RunState};
use vpw_tracker::store::{MemoryStorage, PlateStorage, PlateStore};

fn scheduler(
    store: Arc<PlateStore>,
    checker: Arc<dyn AvailabilityCheck>,
    delay: Duration,
    bus: EventBus,
) -> RefreshScheduler {
    RefreshScheduler::new(store, checker, delay, bus)
}

#[tokio::test]
async fn test_forced_refresh_with_one_failure() {
    let (_, store) = seeded_store(&["CHARLIE", "ALPHA", "BRAVO"]).await;
    let checker = Arc::new(
        ScriptedChecker::new()
            .answer("ALPHA", Ok(CheckStatus::Available))
            .answer("BRAVO", Err(RemoteCheckError::Http { status: 502, body: "bad gateway".into() }))
            .answer("CHARLIE", Ok(CheckStatus::Unavailable)),
    );
    let bus = EventBus::new(32);
    let mut rx = bus.subscribe();
    let scheduler = scheduler(store.clone(), checker.clone(), Duration::ZERO, bus);

    let mut seen = Vec::new();
    let summary = scheduler
        .run_with_progress(true, |p| seen.push((p.completed, p.total)))
        .await
        .unwrap();

    assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.outcome, RunOutcome::CompletedWithErrors);
    assert_eq!(scheduler.state().await, RunState::CompletedWithErrors);

    // Sorted order, one at a time
    assert_eq!(checker.calls(), vec!["ALPHA", "BRAVO", "CHARLIE"]);

    let records = store.load().await.unwrap();
    let by_text = |t: &str| records.iter().find(|r| r.plate_text == t).unwrap().clone();
    let total_history: usize = records.iter().map(|r| r.history.len()).sum();
    assert_eq!(total_history, 3);

    let errors: Vec<&PlateRecord> = records
        .iter()
        .filter(|r| r.history.iter().any(|h| h.status == CheckStatus::Error))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].plate_text, "BRAVO");
    assert!(errors[0].history[0].note.as_deref().unwrap().contains("502"));

    assert_eq!(by_text("ALPHA").last_status, CheckStatus::Available);
    assert_eq!(by_text("CHARLIE").last_status, CheckStatus::Unavailable);
    assert_eq!(by_text("BRAVO").last_status, CheckStatus::Error);

    // Event stream mirrors the callback
    let mut progress = Vec::new();
    loop {
        match rx.recv().await.unwrap() {
            PlateEvent::RefreshStarted { total, forced, .. } => {
                assert_eq!(total, 3);
                assert!(forced);
            }
            PlateEvent::RefreshProgress { completed, total, .. } => progress.push((completed, total)),
            PlateEvent::RefreshCompleted { failed, outcome, .. } => {
                assert_eq!(failed, 1);
                assert_eq!(outcome, RunOutcome::CompletedWithErrors);
                break;
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
    assert_eq!(progress, seen);
}

/// Notes how many store writes had happened when each check began
struct WriteWatcher {
    storage: Arc<MemoryStorage>,
    seen: Mutex<Vec<usize>>,
}

#[async_trait]
impl AvailabilityCheck for WriteWatcher {
    async fn check(&self, _record: &PlateRecord) -> Result<CheckStatus, RemoteCheckError> {
        let writes = self.storage.write_count().await;
        self.seen.lock().unwrap().push(writes);
        Ok(CheckStatus::Unavailable)
    }
}

#[tokio::test]
async fn test_each_record_persisted_before_next() {
    let (storage, store) = seeded_store(&["A1", "B2", "C3"]).await;
    let before = storage.write_count().await;
    let watcher = Arc::new(WriteWatcher {
        storage: storage.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let scheduler = scheduler(store, watcher.clone(), Duration::ZERO, EventBus::new(8));

    scheduler.run(true).await.unwrap();

    assert_eq!(*watcher.seen.lock().unwrap(), vec![before, before + 1, before + 2]);
    assert_eq!(storage.write_count().await, before + 3);
}

#[tokio::test]
async fn test_unforced_run_skips_fresh_plates() {
    let (_, store) = seeded_store(&["FRESH", "STALE", "NEVER"]).await;

    let mut records = store.load().await.unwrap();
    for record in records.iter_mut() {
        match record.plate_text.as_str() {
            "FRESH" => record.record_success(CheckStatus::Unavailable, Utc::now()),
            "STALE" => record.record_success(
                CheckStatus::Unavailable,
                Utc::now() - ChronoDuration::days(62),
            ),
            _ => {}
        }
    }
    store.save(records).await.unwrap();

    let checker = Arc::new(ScriptedChecker::new());
    let scheduler = scheduler(store.clone(), checker.clone(), Duration::ZERO, EventBus::new(8));

    let due: Vec<String> = scheduler
        .due_records(Utc::now())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.plate_text)
        .collect();
    assert_eq!(due, vec!["NEVER", "STALE"]);

    let summary = scheduler.run(false).await.unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(checker.calls(), vec!["NEVER", "STALE"]);
    assert_eq!(scheduler.state().await, RunState::Completed);
}

#[tokio::test]
async fn test_nothing_due_completes_without_writing_or_waiting() {
    let (storage, store) = seeded_store(&["A1"]).await;
    let mut records = store.load().await.unwrap();
    records[0].record_success(CheckStatus::Available, Utc::now());
    store.save(records).await.unwrap();
    let writes_before = storage.write_count().await;

    let checker = Arc::new(ScriptedChecker::new());
    let scheduler = scheduler(store, checker.clone(), Duration::from_secs(30), EventBus::new(8));

    let start = Instant::now();
    let summary = scheduler.run(false).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(summary.total, 0);
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert!(checker.calls().is_empty());
    assert_eq!(storage.write_count().await, writes_before);
}

#[tokio::test]
async fn test_delay_between_requests_but_not_after_last() {
    let (_, store) = seeded_store(&["A1", "B2", "C3"]).await;
    let checker = Arc::new(ScriptedChecker::new());
    let delay = Duration::from_millis(200);
    let scheduler = scheduler(store, checker, delay, EventBus::new(8));

    let start = Instant::now();
    scheduler.run(true).await.unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(380), "two waits expected, got {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(580), "no wait after last plate, got {:?}", elapsed);
}

#[tokio::test]
async fn test_overlapping_run_is_rejected() {
    let (_, store) = seeded_store(&["A1"]).await;
    let checker = Arc::new(GatedChecker::new());
    let scheduler = Arc::new(scheduler(store, checker.clone(), Duration::ZERO, EventBus::new(8)));

    let first = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run(true).await })
    };
    checker.entered.notified().await;
    assert_eq!(scheduler.state().await, RunState::Running);

    let second = scheduler.run(true).await;
    assert!(matches!(second, Err(Error::Conflict(_))));

    checker.release.notify_one();
    let summary = first.await.unwrap().unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(scheduler.state().await, RunState::Completed);
}

#[tokio::test]
async fn test_plate_deleted_mid_run_is_skipped() {
    let (_, store) = seeded_store(&["A1", "B2"]).await;

    /// Deletes B2 while checking A1
    struct DeletingChecker {
        store: Arc<PlateStore>,
    }

    #[async_trait]
    impl AvailabilityCheck for DeletingChecker {
        async fn check(&self, record: &PlateRecord) -> Result<CheckStatus, RemoteCheckError> {
            if record.plate_text == "A1" {
                let key = vpw_common::derive_key(&plate("B2"));
                self.store.delete_by_key(&key).await.unwrap();
            }
            Ok(CheckStatus::Available)
        }
    }

    let checker = Arc::new(DeletingChecker { store: store.clone() });
    let scheduler = scheduler(store.clone(), checker, Duration::ZERO, EventBus::new(8));

    let summary = scheduler.run(true).await.unwrap();
    assert_eq!(summary.total, 2);

    let records = store.load().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].plate_text, "A1");
    assert_eq!(records[0].history.len(), 1);
}

/// Storage that serves a fixed payload and refuses every write
struct ReadOnlyStorage {
    payload: String,
}

#[async_trait]
impl PlateStorage for ReadOnlyStorage {
    async fn read_raw(&self) -> vpw_common::Result<Option<String>> {
        Ok(Some(self.payload.clone()))
    }

    async fn write_raw(&self, _payload: &str) -> vpw_common::Result<()> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only medium",
        )))
    }

    fn describe(&self) -> String {
        "read-only".to_string()
    }
}

#[tokio::test]
async fn test_unpersisted_results_count_as_failures() {
    let payload = serde_json::to_string(&vec![plate("A1"), plate("B2")]).unwrap();
    let store = Arc::new(PlateStore::new(Arc::new(ReadOnlyStorage { payload })));
    let checker = Arc::new(ScriptedChecker::new().answer("A1", Ok(CheckStatus::Available)));
    let scheduler = scheduler(store, checker, Duration::ZERO, EventBus::new(8));

    let mut statuses = Vec::new();
    let summary = scheduler
        .run_with_progress(true, |p| statuses.push(p.status))
        .await
        .unwrap();

    assert_eq!(statuses, vec![CheckStatus::Error, CheckStatus::Error]);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.outcome, RunOutcome::CompletedWithErrors);
    assert_eq!(scheduler.state().await, RunState::CompletedWithErrors);
}
