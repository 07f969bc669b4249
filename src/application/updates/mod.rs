//! Background tracking of in-flight image upgrades.
//!
//! An upgrade request persists the new version and then hands an
//! [`ImageUpdateJob`] to the [`UpdateQueue`]. The [`UpdatePool`] drains the
//! queue with a bounded number of workers, polling each job until it either
//! succeeds or is rolled back.

mod in_flight;
mod job;
mod pool;
mod queue;

pub use in_flight::{InFlightGuard, InFlightUpgrades};
pub use job::ImageUpdateJob;
pub use pool::{
    DEFAULT_MAX_WORKERS, DEFAULT_POLL_INTERVAL, METRIC_UPDATE_COMPLETED_TOTAL,
    METRIC_UPDATE_IN_FLIGHT, METRIC_UPDATE_REQUEUE_TOTAL, METRIC_UPDATE_ROLLBACK_TOTAL, PoolConfig,
    UpdatePool, WorkOutcome, work,
};
pub use queue::{QueueClosed, UpdateQueue};

use async_trait::async_trait;
use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::domain::image::ExecutionScope;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// The four operations the worker pool needs from a job.
#[async_trait]
pub trait Updatable: Send {
    fn is_successful(&self) -> bool;

    async fn upgrade(&mut self) -> Result<(), UpdateError>;

    async fn check_for_update(&mut self) -> Result<(), UpdateError>;

    /// Expected to succeed; failures are logged by the pool and then dropped.
    async fn rollback(&mut self) -> Result<(), UpdateError>;
}

/// Gives the pool access to the cancellation scope bounding a job.
pub trait Scoped {
    fn execution_scope(&self) -> &ExecutionScope;
}

/// Anything the pool can schedule.
pub trait UpdateJob: Updatable + Scoped + Send + 'static {}

impl<T> UpdateJob for T where T: Updatable + Scoped + Send + 'static {}
