//! Repository contract shared by the durable store, the cache and the
//! read-through composition of both.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::account::Account;
use crate::domain::error::DomainError;
use crate::domain::image::Image;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error("cache error: {0}")]
    Cache(String),
    #[error("failed to encode or decode image: {0}")]
    Codec(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn cache(err: impl std::fmt::Display) -> Self {
        Self::Cache(err.to_string())
    }

    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound)
    }
}

/// Change applied during a read-modify-write.
///
/// The same mutator may run more than once (once against the cached copy and
/// once against the durable copy), so it must be `Fn` and must not rely on
/// side effects.
pub type ImageMutator = Arc<dyn Fn(Image) -> Result<Image, DomainError> + Send + Sync>;

/// Wrap a closure as an [`ImageMutator`].
pub fn mutator<F>(f: F) -> ImageMutator
where
    F: Fn(Image) -> Result<Image, DomainError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Tenant-scoped image storage.
///
/// Callers must not run two `update` calls for the same image concurrently:
/// read-modify-write is only as safe as the caller's per-id serialization.
#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn create(&self, account: &Account, image: &Image) -> Result<(), RepoError>;

    async fn get(&self, account: &Account, uuid: &str) -> Result<Image, RepoError>;

    /// Load, apply `mutator`, persist. Nothing is written when the mutator fails.
    /// Returns the image as stored.
    async fn update(
        &self,
        account: &Account,
        uuid: &str,
        mutator: ImageMutator,
    ) -> Result<Image, RepoError>;

    async fn delete(&self, account: &Account, uuid: &str) -> Result<(), RepoError>;

    async fn list(&self, account: &Account) -> Result<Vec<Image>, RepoError>;
}
