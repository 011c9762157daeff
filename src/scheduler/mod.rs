//! Calendar-driven job scheduler.
//!
//! Jobs are registered with a cron expression and an async action, then
//! driven by one tokio task per job. A fired action is spawned off the tick
//! loop with a busy flag: if the previous run is still executing when the
//! next trigger fires, the new run is skipped and logged rather than queued.
//! A failing run is logged and never deregisters the job.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use croner::Cron;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::LifecycleConfig;
use crate::observability::Logger;
use crate::snapshot::SnapshotStore;
use crate::store::StoreHandle;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job '{0}' is already registered")]
    DuplicateJob(String),

    #[error("invalid cron expression '{expression}' for job '{name}': {source}")]
    InvalidCron {
        name: String,
        expression: String,
        #[source]
        source: croner::errors::CronError,
    },

    #[error("scheduler job table lock poisoned")]
    LockPoisoned,
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Async job body. Errors are logged, never propagated.
pub type JobAction = Arc<dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Point-in-time view of one registered job.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub name: String,
    pub running: bool,
    pub runs: u64,
    pub next_run: Option<DateTime<Utc>>,
}

struct Job {
    cron: Cron,
    expression: String,
    action: JobAction,
    /// Set while a fired run is still executing
    busy: Arc<AtomicBool>,
    /// Fires observed, including skipped and failed ones
    runs: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

/// Owns the job table and the per-job tick tasks.
#[derive(Default)]
pub struct Scheduler {
    jobs: Mutex<HashMap<String, Job>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job. Seconds-resolution expressions are accepted alongside
    /// classic five-field ones.
    pub fn register(&self, name: &str, expression: &str, action: JobAction) -> SchedulerResult<()> {
        let cron = Cron::new(expression)
            .with_seconds_optional()
            .parse()
            .map_err(|source| SchedulerError::InvalidCron {
                name: name.to_string(),
                expression: expression.to_string(),
                source,
            })?;

        let mut jobs = self.jobs.lock().map_err(|_| SchedulerError::LockPoisoned)?;
        if jobs.contains_key(name) {
            return Err(SchedulerError::DuplicateJob(name.to_string()));
        }

        jobs.insert(
            name.to_string(),
            Job {
                cron,
                expression: expression.to_string(),
                action,
                busy: Arc::new(AtomicBool::new(false)),
                runs: Arc::new(AtomicU64::new(0)),
                handle: None,
            },
        );

        Logger::info(
            "JOB_REGISTERED",
            &[("cron", expression), ("job", name)],
        );
        Ok(())
    }

    /// Start tick loops for all registered jobs. Already-running jobs are
    /// left alone with a warning.
    pub fn start(&self) -> SchedulerResult<()> {
        let mut jobs = self.jobs.lock().map_err(|_| SchedulerError::LockPoisoned)?;

        for (name, job) in jobs.iter_mut() {
            if job.handle.as_ref().is_some_and(|h| !h.is_finished()) {
                Logger::warn("JOB_ALREADY_RUNNING", &[("job", name)]);
                continue;
            }

            job.handle = Some(tokio::spawn(tick_loop(
                name.clone(),
                job.cron.clone(),
                job.action.clone(),
                job.busy.clone(),
                job.runs.clone(),
            )));
            Logger::info("JOB_STARTED", &[("job", name)]);
        }

        Ok(())
    }

    /// Stop all tick loops. Safe to call when nothing is running.
    pub fn stop(&self) -> SchedulerResult<()> {
        let mut jobs = self.jobs.lock().map_err(|_| SchedulerError::LockPoisoned)?;

        let mut stopped = 0;
        for (name, job) in jobs.iter_mut() {
            if let Some(handle) = job.handle.take() {
                handle.abort();
                stopped += 1;
                Logger::info("JOB_STOPPED", &[("job", name)]);
            }
        }

        if stopped == 0 {
            Logger::warn("SCHEDULER_ALREADY_STOPPED", &[]);
        }
        Ok(())
    }

    /// Snapshot of every job's state, sorted by name.
    pub fn status(&self) -> SchedulerResult<Vec<JobStatus>> {
        let jobs = self.jobs.lock().map_err(|_| SchedulerError::LockPoisoned)?;

        let mut statuses: Vec<JobStatus> = jobs
            .iter()
            .map(|(name, job)| JobStatus {
                name: name.clone(),
                running: job.handle.as_ref().is_some_and(|h| !h.is_finished()),
                runs: job.runs.load(Ordering::SeqCst),
                next_run: job.cron.find_next_occurrence(&Utc::now(), false).ok(),
            })
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(statuses)
    }

    /// The cron expression a job was registered with, if it exists.
    pub fn expression(&self, name: &str) -> SchedulerResult<Option<String>> {
        let jobs = self.jobs.lock().map_err(|_| SchedulerError::LockPoisoned)?;
        Ok(jobs.get(name).map(|j| j.expression.clone()))
    }
}

/// Per-job loop: sleep until the next occurrence, fire, repeat.
async fn tick_loop(
    name: String,
    cron: Cron,
    action: JobAction,
    busy: Arc<AtomicBool>,
    runs: Arc<AtomicU64>,
) {
    loop {
        let next = match cron.find_next_occurrence(&Utc::now(), false) {
            Ok(next) => next,
            Err(e) => {
                Logger::error(
                    "JOB_SCHEDULE_EXHAUSTED",
                    &[("error", &e.to_string()), ("job", &name)],
                );
                return;
            }
        };

        let wait = (next - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;

        // Count the fire whether it runs, skips, or fails
        runs.fetch_add(1, Ordering::SeqCst);

        if busy.swap(true, Ordering::SeqCst) {
            Logger::warn("JOB_SKIPPED_BUSY", &[("job", &name)]);
            continue;
        }

        let fut = (action)();
        let job_name = name.clone();
        let busy_flag = busy.clone();
        tokio::spawn(async move {
            let _reset = BusyReset(busy_flag);
            match fut.await {
                Ok(()) => Logger::info("JOB_COMPLETE", &[("job", &job_name)]),
                Err(e) => Logger::error(
                    "JOB_FAILED",
                    &[("error", &e), ("job", &job_name)],
                ),
            }
        });
    }
}

/// Clears the busy flag even if the action panics.
struct BusyReset(Arc<AtomicBool>);

impl Drop for BusyReset {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Register the stock backup jobs against a snapshot store.
///
/// The daily job takes an incremental snapshot (skipped when the store is
/// unchanged), the weekly and monthly jobs always take a full one, and the
/// cleanup job applies the retention policy.
pub fn register_standard_jobs<S>(
    scheduler: &Scheduler,
    snapshots: Arc<SnapshotStore<S>>,
    config: &LifecycleConfig,
) -> SchedulerResult<()>
where
    S: StoreHandle + Send + Sync + 'static,
{
    let daily = snapshots.clone();
    scheduler.register(
        "daily-backup",
        &config.jobs.daily,
        Arc::new(move || {
            let snapshots = daily.clone();
            Box::pin(async move {
                snapshots
                    .create_incremental_snapshot("scheduled daily backup")
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
        }),
    )?;

    let weekly = snapshots.clone();
    scheduler.register(
        "weekly-backup",
        &config.jobs.weekly,
        Arc::new(move || {
            let snapshots = weekly.clone();
            Box::pin(async move {
                snapshots
                    .create_snapshot("scheduled weekly backup")
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
        }),
    )?;

    let monthly = snapshots.clone();
    scheduler.register(
        "monthly-backup",
        &config.jobs.monthly,
        Arc::new(move || {
            let snapshots = monthly.clone();
            Box::pin(async move {
                snapshots
                    .create_snapshot("scheduled monthly backup")
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
        }),
    )?;

    let cleanup = snapshots;
    let retention = config.retention.clone();
    scheduler.register(
        "retention-cleanup",
        &config.jobs.cleanup,
        Arc::new(move || {
            let snapshots = cleanup.clone();
            let retention = retention.clone();
            Box::pin(async move {
                snapshots
                    .enforce_retention(&retention)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
        }),
    )?;

    Ok(())
}
