//! Scheduler background loop.
//!
//! Sleeps until the next weekly fire instant, then runs one cycle over every
//! roster entry: export, notify, and evict when the key is stale. Eviction of
//! a key always follows its own export and notify attempt.

use crate::artifacts::ArtifactStore;
use crate::export::Exporter;
use crate::notify::{Delivered, Notifier};
use crate::roster::{EvictOutcome, RosterEntry, RosterStore};
use crate::scheduler::schedule::WeeklySchedule;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Number of cycle reports to keep.
const DEFAULT_HISTORY_LIMIT: usize = 52;

/// Lifecycle state of the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    #[default]
    Idle,
    Firing,
}

/// What happened to one roster key during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateOutcome {
    pub key: String,
    /// Rows in the exported artifact.
    pub rows: usize,
    /// Whether the notification push succeeded.
    pub delivered: bool,
    /// Whether the key's entry is gone after the cycle.
    pub evicted: bool,
    /// Delivery error, if any.
    pub error: Option<String>,
}

/// Record of a single cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dates: Vec<DateOutcome>,
    /// Set when shutdown interrupted the cycle; remaining keys were untouched.
    pub cancelled: bool,
}

impl CycleReport {
    /// Number of keys whose notification failed.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.dates.iter().filter(|d| !d.delivered).count()
    }
}

/// Point-in-time view served by the health endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub next_run: Option<DateTime<Utc>>,
    pub last_cycle: Option<CycleReport>,
}

#[derive(Debug, Default)]
struct StatusInner {
    state: SchedulerState,
    next_run: Option<DateTime<Utc>>,
    history: VecDeque<CycleReport>,
}

/// Shared handle to the scheduler's state and run history.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<Mutex<StatusInner>>,
}

impl StatusHandle {
    fn lock(&self) -> MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state, next fire and most recent cycle.
    #[must_use]
    pub fn snapshot(&self) -> SchedulerStatus {
        let inner = self.lock();
        SchedulerStatus {
            state: inner.state,
            next_run: inner.next_run,
            last_cycle: inner.history.back().cloned(),
        }
    }

    /// Recent cycle reports, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<CycleReport> {
        self.lock().history.iter().cloned().collect()
    }

    fn set_state(&self, state: SchedulerState) {
        self.lock().state = state;
    }

    fn set_next_run(&self, next_run: Option<DateTime<Utc>>) {
        self.lock().next_run = next_run;
    }

    fn push_history(&self, report: CycleReport, limit: usize) {
        let mut inner = self.lock();
        inner.history.push_back(report);
        while inner.history.len() > limit {
            inner.history.pop_front();
        }
    }
}

/// Weekly export, notify and evict runner.
pub struct Scheduler {
    store: Arc<RosterStore>,
    exporter: Exporter,
    notifier: Notifier,
    artifacts: ArtifactStore,
    schedule: WeeklySchedule,
    prune_on_evict: bool,
    status: StatusHandle,
    max_history_entries: usize,
}

impl Scheduler {
    pub fn new(
        store: Arc<RosterStore>,
        exporter: Exporter,
        notifier: Notifier,
        artifacts: ArtifactStore,
        schedule: WeeklySchedule,
    ) -> Self {
        Self {
            store,
            exporter,
            notifier,
            artifacts,
            schedule,
            prune_on_evict: false,
            status: StatusHandle::default(),
            max_history_entries: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Delete a key's persisted artifact once its entry is evicted.
    pub fn with_prune_on_evict(mut self, prune: bool) -> Self {
        self.prune_on_evict = prune;
        self
    }

    /// Override the in-memory cycle history limit.
    pub fn with_history_limit(mut self, max_entries: usize) -> Self {
        self.max_history_entries = max_entries.max(1);
        self
    }

    /// Handle for observing state and history from other tasks.
    #[must_use]
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    #[must_use]
    pub fn schedule(&self) -> &WeeklySchedule {
        &self.schedule
    }

    /// Start the scheduler background loop. It stops when `cancel` fires.
    pub fn run(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(schedule = %self.schedule, "scheduler started");
            let mut after = Utc::now();

            loop {
                let next = self.schedule.next_after(after);
                self.status.set_next_run(Some(next));
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                debug!(next_run = %next, "scheduler sleeping for {}s", wait.as_secs());

                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(wait) => {}
                }

                let report = self.run_cycle(Utc::now(), &cancel).await;
                if report.cancelled {
                    break;
                }
                // Never compute the next fire from before the one just handled.
                after = next.max(Utc::now());
            }

            self.status.set_next_run(None);
            info!("scheduler stopped");
        })
    }

    /// Run one cycle as of `now`.
    ///
    /// Keys are processed sequentially from a snapshot taken at the start.
    /// Each key is exported, then notified, then evicted if stale. A failed
    /// notification is recorded and does not stop the cycle. Cancellation is
    /// checked before each key.
    pub async fn run_cycle(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> CycleReport {
        let started_at = Utc::now();
        let today = now.with_timezone(&self.schedule.timezone).date_naive();
        self.status.set_state(SchedulerState::Firing);

        let entries = self.store.entries();
        info!(keys = entries.len(), %today, "roster cycle started");

        let mut dates = Vec::with_capacity(entries.len());
        let mut cancelled = false;
        for entry in &entries {
            if cancel.is_cancelled() {
                warn!(
                    remaining = entries.len() - dates.len(),
                    "roster cycle cancelled"
                );
                cancelled = true;
                break;
            }
            dates.push(self.process_entry(entry, today).await);
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            dates,
            cancelled,
        };
        info!(
            keys = report.dates.len(),
            failures = report.failures(),
            "roster cycle finished"
        );

        self.status
            .push_history(report.clone(), self.max_history_entries);
        self.status.set_state(SchedulerState::Idle);
        report
    }

    async fn process_entry(&self, entry: &RosterEntry, today: NaiveDate) -> DateOutcome {
        let artifact = self.exporter.export(entry).await;

        let (delivered, error) = match self.notifier.notify(&entry.key, &artifact).await {
            Ok(Delivered::Link { url }) => {
                info!(date = %entry.key, rows = artifact.rows, %url, "roster delivered");
                (true, None)
            }
            Ok(Delivered::Inline { truncated }) => {
                info!(date = %entry.key, rows = artifact.rows, truncated, "roster delivered");
                (true, None)
            }
            Err(err) => {
                warn!(date = %entry.key, "roster delivery failed: {err}");
                (false, Some(err.to_string()))
            }
        };

        // Export and notify have been attempted; only now may the key go.
        let mut evicted = false;
        if entry.key.is_stale(today) {
            match self.store.evict_exported(&entry.key, &entry.participants) {
                EvictOutcome::Removed => {
                    evicted = true;
                    info!(date = %entry.key, "roster entry evicted");
                    if self.prune_on_evict {
                        self.prune(&artifact.file_name).await;
                    }
                }
                EvictOutcome::Retained { remaining } => {
                    info!(
                        date = %entry.key,
                        remaining,
                        "late registrations kept for the next cycle"
                    );
                }
                EvictOutcome::Missing => {
                    debug!(date = %entry.key, "roster entry already gone");
                    evicted = true;
                }
            }
        }

        DateOutcome {
            key: entry.key.to_string(),
            rows: artifact.rows,
            delivered,
            evicted,
            error,
        }
    }

    async fn prune(&self, file_name: &str) {
        match self.artifacts.remove(file_name).await {
            Ok(true) => debug!(file_name, "pruned artifact"),
            Ok(false) => {}
            Err(err) => warn!(file_name, "cannot prune artifact: {err}"),
        }
    }
}
