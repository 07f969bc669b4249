use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::UpdateJob;
use super::queue::UpdateQueue;

pub const DEFAULT_MAX_WORKERS: usize = 10;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

pub const METRIC_UPDATE_COMPLETED_TOTAL: &str = "edge_update_completed_total";
pub const METRIC_UPDATE_ROLLBACK_TOTAL: &str = "edge_update_rollback_total";
pub const METRIC_UPDATE_REQUEUE_TOTAL: &str = "edge_update_requeue_total";
pub const METRIC_UPDATE_IN_FLIGHT: &str = "edge_update_in_flight";

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_workers: NonZeroUsize,
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: NonZeroUsize::new(DEFAULT_MAX_WORKERS).unwrap_or(NonZeroUsize::MIN),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// How a single worker pass over a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Completed,
    RolledBack,
    Requeued,
    /// The job was still pending but the queue had been closed.
    Dropped,
}

/// Bounded set of workers draining an [`UpdateQueue`].
pub struct UpdatePool<J> {
    queue: UpdateQueue<J>,
    permits: Arc<Semaphore>,
    config: PoolConfig,
}

impl<J> Clone for UpdatePool<J> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            permits: Arc::clone(&self.permits),
            config: self.config,
        }
    }
}

impl<J: UpdateJob> UpdatePool<J> {
    pub fn new(queue: UpdateQueue<J>, config: PoolConfig) -> Self {
        Self {
            queue,
            permits: Arc::new(Semaphore::new(config.max_workers.get())),
            config,
        }
    }

    pub fn queue(&self) -> &UpdateQueue<J> {
        &self.queue
    }

    /// Number of workers currently holding a job.
    pub fn in_flight(&self) -> usize {
        self.config
            .max_workers
            .get()
            .saturating_sub(self.permits.available_permits())
    }

    /// Dispatch loop. A free worker slot is reserved before a job is taken,
    /// so at most `max_workers` jobs run at once and the rest stay queued.
    /// Returns when `shutdown` fires or the queue is closed; running workers
    /// are left to finish on their own.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            max_workers = self.config.max_workers.get(),
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "update pool started"
        );

        loop {
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let job = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                job = self.queue.get() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let queue = self.queue.clone();
            let poll_interval = self.config.poll_interval;
            let permits = Arc::clone(&self.permits);
            let max_workers = self.config.max_workers.get();
            gauge!(METRIC_UPDATE_IN_FLIGHT).set(in_flight_of(&permits, max_workers) as f64);

            tokio::spawn(async move {
                work(&queue, job, poll_interval).await;
                drop(permit);
                gauge!(METRIC_UPDATE_IN_FLIGHT).set(in_flight_of(&permits, max_workers) as f64);
            });
        }

        info!("update pool stopped");
    }
}

fn in_flight_of(permits: &Semaphore, max_workers: usize) -> usize {
    max_workers.saturating_sub(permits.available_permits())
}

/// One worker pass over `job`.
///
/// A failed check rolls the job back. A successful job is done. Otherwise the
/// worker waits for either the job's scope to end, which rolls it back, or
/// the poll interval to elapse, which puts the job back on the queue. A
/// closed queue drops the job instead.
pub async fn work<J: UpdateJob>(
    queue: &UpdateQueue<J>,
    mut job: J,
    poll_interval: Duration,
) -> WorkOutcome {
    if let Err(err) = job.check_for_update().await {
        error!(error = %err, "update check failed, rolling back");
        rollback(&mut job).await;
        return WorkOutcome::RolledBack;
    }

    if job.is_successful() {
        debug!("update completed");
        counter!(METRIC_UPDATE_COMPLETED_TOTAL).increment(1);
        return WorkOutcome::Completed;
    }

    let scope = job.execution_scope().clone();
    tokio::select! {
        _ = scope.done() => {
            error!(
                cancelled = scope.is_cancelled(),
                "update scope ended before the build finished, rolling back"
            );
            rollback(&mut job).await;
            WorkOutcome::RolledBack
        }
        _ = tokio::time::sleep(poll_interval) => {
            match queue.add(job) {
                Ok(()) => {
                    counter!(METRIC_UPDATE_REQUEUE_TOTAL).increment(1);
                    WorkOutcome::Requeued
                }
                Err(err) => {
                    warn!(error = %err, "dropping update job");
                    WorkOutcome::Dropped
                }
            }
        }
    }
}

async fn rollback<J: UpdateJob>(job: &mut J) {
    counter!(METRIC_UPDATE_ROLLBACK_TOTAL).increment(1);
    if let Err(err) = job.rollback().await {
        error!(error = %err, "rollback failed");
    }
}
