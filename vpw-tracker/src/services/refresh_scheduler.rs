//! Due-based availability refresh
//!
//! A run moves `Idle -> Running -> Completed | CompletedWithErrors` and always
//! runs to the end once started. Plates are checked strictly one at a time
//! in persisted (plate text) order. After each check the store is written
//! and progress is reported, then the scheduler sleeps for the courtesy
//! delay before the next request. There is no sleep after the last plate.
//!
//! A plate is due when it has never been checked, when its last check time
//! cannot be parsed, or when that check happened in an earlier calendar
//! month (UTC). Staleness therefore resets on the first of each month.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, error, info, warn};
use vpw_common::events::{EventBus, PlateEvent, RunOutcome};
use vpw_common::model::{CheckStatus, PlateRecord};
use vpw_common::time::{self, same_calendar_month};
use vpw_common::{derive_key, Error, Result};

use super::availability::AvailabilityCheck;
use crate::store::{CheckOutcome, PlateStore};

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    CompletedWithErrors,
}

impl From<RunOutcome> for RunState {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed => RunState::Completed,
            RunOutcome::CompletedWithErrors => RunState::CompletedWithErrors,
        }
    }
}

/// Progress after one plate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshProgress {
    pub completed: usize,
    pub total: usize,
    pub plate_text: String,
    pub status: CheckStatus,
}

/// What a finished run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub forced: bool,
    pub outcome: RunOutcome,
}

/// True if the record's availability should be re-checked at `now`
pub fn is_due(record: &PlateRecord, now: DateTime<Utc>) -> bool {
    match record.last_checked() {
        None => true,
        Some(last) => !same_calendar_month(last, now),
    }
}

/// Records a run would check: all of them when forced, else only the due ones
pub fn select_targets(records: Vec<PlateRecord>, force: bool, now: DateTime<Utc>) -> Vec<PlateRecord> {
    if force {
        return records;
    }
    records.into_iter().filter(|r| is_due(r, now)).collect()
}

/// Exclusive claim on a scheduler, held for the length of one run
///
/// Obtained with [`RefreshScheduler::try_begin`]; dropping it without running
/// releases the claim.
pub struct RunGuard {
    _claim: OwnedMutexGuard<()>,
}

pub struct RefreshScheduler {
    store: Arc<PlateStore>,
    checker: Arc<dyn AvailabilityCheck>,
    request_delay: Duration,
    events: EventBus,
    state: RwLock<RunState>,
    run_lock: Arc<Mutex<()>>,
}

impl RefreshScheduler {
    pub fn new(
        store: Arc<PlateStore>,
        checker: Arc<dyn AvailabilityCheck>,
        request_delay: Duration,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            checker,
            request_delay,
            events,
            state: RwLock::new(RunState::Idle),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn state(&self) -> RunState {
        *self.state.read().await
    }

    async fn set_state(&self, state: RunState) {
        *self.state.write().await = state;
    }

    /// Plates an unforced run would check right now
    pub async fn due_records(&self, now: DateTime<Utc>) -> Result<Vec<PlateRecord>> {
        Ok(select_targets(self.store.load().await?, false, now))
    }

    /// Run a refresh pass, reporting progress only through the event bus
    pub async fn run(&self, force: bool) -> Result<RefreshSummary> {
        self.run_with_progress(force, |_| {}).await
    }

    /// Claim the scheduler for one run
    ///
    /// Fails with `Conflict` if a run is already in progress. The claim is
    /// taken synchronously so callers that start the run in the background
    /// can still report the conflict.
    pub fn try_begin(&self) -> Result<RunGuard> {
        let claim = self
            .run_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| Error::Conflict("a refresh run is already in progress".to_string()))?;
        Ok(RunGuard { _claim: claim })
    }

    /// Run a refresh pass, calling `on_progress` after each plate
    ///
    /// Fails with `Conflict` if another run is in progress on this scheduler.
    /// Per-plate failures never abort the run; they are recorded as `Error`
    /// entries in the plate's history.
    pub async fn run_with_progress<F>(&self, force: bool, on_progress: F) -> Result<RefreshSummary>
    where
        F: FnMut(&RefreshProgress) + Send,
    {
        let guard = self.try_begin()?;
        self.run_guarded(guard, force, on_progress).await
    }

    /// Run a refresh pass under a claim from [`try_begin`](Self::try_begin)
    pub async fn run_guarded<F>(
        &self,
        guard: RunGuard,
        force: bool,
        mut on_progress: F,
    ) -> Result<RefreshSummary>
    where
        F: FnMut(&RefreshProgress) + Send,
    {
        let _guard = guard;

        let targets = select_targets(self.store.load().await?, force, time::now());
        let total = targets.len();

        if total == 0 {
            info!(forced = force, "Refresh: nothing due");
            let summary = RefreshSummary {
                total: 0,
                succeeded: 0,
                failed: 0,
                forced: force,
                outcome: RunOutcome::Completed,
            };
            self.finish(&summary).await;
            return Ok(summary);
        }

        self.set_state(RunState::Running).await;
        info!(total, forced = force, "Refresh started");
        self.events.emit_lossy(PlateEvent::RefreshStarted {
            total,
            forced: force,
            timestamp: time::now(),
        });

        let mut failed = 0;
        for (index, record) in targets.iter().enumerate() {
            let key = derive_key(record);

            let outcome = match self.checker.check(record).await {
                Ok(status) => CheckOutcome::Status(status),
                Err(e) => {
                    warn!(plate = %key, error = %e, "Availability check failed");
                    CheckOutcome::Failed(e.to_string())
                }
            };

            // A result that could not be persisted counts as a failed check
            let status = match self.store.record_check(&key, &outcome, time::now()).await {
                Ok(Some(_)) => outcome.status(),
                Ok(None) => {
                    warn!(plate = %key, "Plate removed during refresh, result discarded");
                    outcome.status()
                }
                Err(e) => {
                    error!(plate = %key, error = %e, "Failed to persist check result");
                    CheckStatus::Error
                }
            };
            if status == CheckStatus::Error {
                failed += 1;
            }

            let progress = RefreshProgress {
                completed: index + 1,
                total,
                plate_text: record.plate_text.clone(),
                status,
            };
            debug!(
                completed = progress.completed,
                total,
                plate = %progress.plate_text,
                status = %progress.status,
                "Refresh progress"
            );
            on_progress(&progress);
            self.events.emit_lossy(PlateEvent::RefreshProgress {
                completed: progress.completed,
                total,
                plate_text: progress.plate_text,
                status: progress.status,
                timestamp: time::now(),
            });

            if index + 1 < total && !self.request_delay.is_zero() {
                debug!("Refresh throttle: waiting {:?}", self.request_delay);
                tokio::time::sleep(self.request_delay).await;
            }
        }

        let summary = RefreshSummary {
            total,
            succeeded: total - failed,
            failed,
            forced: force,
            outcome: if failed == 0 {
                RunOutcome::Completed
            } else {
                RunOutcome::CompletedWithErrors
            },
        };
        self.finish(&summary).await;
        Ok(summary)
    }

    async fn finish(&self, summary: &RefreshSummary) {
        self.set_state(summary.outcome.into()).await;
        info!(
            total = summary.total,
            failed = summary.failed,
            outcome = ?summary.outcome,
            "Refresh finished"
        );
        self.events.emit_lossy(PlateEvent::RefreshCompleted {
            total: summary.total,
            failed: summary.failed,
            outcome: summary.outcome,
            timestamp: time::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vpw_common::model::{format_timestamp, Facets, Jurisdiction};

    fn checked_at(at: DateTime<Utc>) -> PlateRecord {
        let mut record = PlateRecord::new("A1", Jurisdiction::Idaho, Facets::default());
        record.record_success(CheckStatus::Available, at);
        record
    }

    #[test]
    fn test_never_checked_is_due() {
        let record = PlateRecord::new("A1", Jurisdiction::Idaho, Facets::default());
        assert!(is_due(&record, Utc::now()));
    }

    #[test]
    fn test_unparsable_timestamp_is_due() {
        let mut record = checked_at(Utc::now());
        record.last_checked_utc = Some("yesterday-ish".to_string());
        assert!(is_due(&record, Utc::now()));
    }

    #[test]
    fn test_month_boundary() {
        let last_day = Utc.with_ymd_and_hms(2024, 1, 31, 22, 0, 0).unwrap();
        let first_next = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 1).unwrap();
        let later_same_day = Utc.with_ymd_and_hms(2024, 2, 1, 23, 0, 0).unwrap();

        assert!(!is_due(&checked_at(last_day), last_day));
        assert!(is_due(&checked_at(last_day), first_next));
        assert!(!is_due(&checked_at(first_next), later_same_day));
    }

    #[test]
    fn test_same_month_last_year_is_due() {
        let last = Utc.with_ymd_and_hms(2023, 6, 10, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 12, 0, 0, 0).unwrap();
        assert!(is_due(&checked_at(last), now));
    }

    #[test]
    fn test_offset_timestamps_compare_in_utc() {
        let mut record = checked_at(Utc::now());
        // 2024-03-31 20:00 at -07:00 is already April in UTC
        record.last_checked_utc = Some("2024-03-31T20:00:00-07:00".to_string());
        let april = Utc.with_ymd_and_hms(2024, 4, 20, 0, 0, 0).unwrap();
        assert!(!is_due(&record, april));
        assert_eq!(
            record.last_checked().map(format_timestamp).as_deref(),
            Some("2024-04-01T03:00:00.000Z")
        );
    }

    #[test]
    fn test_select_targets() {
        let now = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        let fresh = checked_at(Utc.with_ymd_and_hms(2024, 2, 3, 0, 0, 0).unwrap());
        let stale = checked_at(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap());
        let records = vec![fresh, stale.clone()];

        assert_eq!(select_targets(records.clone(), false, now), vec![stale]);
        assert_eq!(select_targets(records, true, now).len(), 2);
    }
}
