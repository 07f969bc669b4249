use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::application::repos::{ImageMutator, ImageRepository, RepoError};
use crate::domain::account::Account;
use crate::domain::image::Image;

use super::KeyValueStore;

pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

pub fn image_key(account: &Account, uuid: &str) -> String {
    format!("{account}:image:{uuid}")
}

pub fn image_prefix(account: &Account) -> String {
    format!("{account}:image:")
}

/// [`ImageRepository`] over a [`KeyValueStore`].
#[derive(Clone)]
pub struct CacheImageRepository {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl CacheImageRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_ttl(store, DEFAULT_TTL)
    }

    pub fn with_ttl(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    async fn put(&self, key: &str, image: &Image) -> Result<(), RepoError> {
        let blob = serde_json::to_vec(image).map_err(RepoError::codec)?;
        self.store
            .set_ex(key, Bytes::from(blob), self.ttl)
            .await
            .map_err(RepoError::cache)
    }

    /// Undecodable blobs read as a miss.
    async fn load(&self, key: &str) -> Result<Image, RepoError> {
        let blob = self
            .store
            .get(key)
            .await
            .map_err(RepoError::cache)?
            .ok_or(RepoError::NotFound)?;
        serde_json::from_slice(&blob).map_err(|err| {
            warn!(key, error = %err, "ignoring undecodable cached image");
            RepoError::NotFound
        })
    }
}

#[async_trait]
impl ImageRepository for CacheImageRepository {
    async fn create(&self, account: &Account, image: &Image) -> Result<(), RepoError> {
        let key = image_key(account, image.uuid());
        debug!(key = %key, "cache create image");
        self.put(&key, image).await
    }

    async fn get(&self, account: &Account, uuid: &str) -> Result<Image, RepoError> {
        let key = image_key(account, uuid);
        debug!(key = %key, "cache get image");
        self.load(&key).await
    }

    async fn update(
        &self,
        account: &Account,
        uuid: &str,
        mutator: ImageMutator,
    ) -> Result<Image, RepoError> {
        let key = image_key(account, uuid);
        debug!(key = %key, "cache update image");
        let current = self.load(&key).await?;
        let updated = mutator(current)?;
        self.put(&key, &updated).await?;
        Ok(updated)
    }

    async fn delete(&self, account: &Account, uuid: &str) -> Result<(), RepoError> {
        let key = image_key(account, uuid);
        debug!(key = %key, "cache delete image");
        self.store.del(&key).await.map_err(RepoError::cache)
    }

    /// Keys that vanish between the scan and the read are skipped.
    async fn list(&self, account: &Account) -> Result<Vec<Image>, RepoError> {
        let prefix = image_prefix(account);
        debug!(prefix = %prefix, "cache list images");
        let keys = self
            .store
            .scan_prefix(&prefix)
            .await
            .map_err(RepoError::cache)?;

        let mut images = Vec::with_capacity(keys.len());
        for key in keys {
            match self.load(&key).await {
                Ok(image) => images.push(image),
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(images)
    }
}
