//! Cache-first image repository backed by the durable store.
//!
//! The cache never decides the outcome of a call. Cache writes happen first
//! and their failures are logged and dropped; the durable result is what the
//! caller sees. A read that misses the cache is served by the durable store
//! and the cache is repaired in the background.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, warn};

use crate::application::repos::{ImageMutator, ImageRepository, RepoError};
use crate::domain::account::Account;
use crate::domain::image::Image;

pub const METRIC_CACHE_HIT_TOTAL: &str = "edge_image_cache_hit_total";
pub const METRIC_CACHE_MISS_TOTAL: &str = "edge_image_cache_miss_total";

#[derive(Clone)]
pub struct ReadThroughImageRepository {
    cache: Arc<dyn ImageRepository>,
    store: Arc<dyn ImageRepository>,
}

impl ReadThroughImageRepository {
    pub fn new(cache: Arc<dyn ImageRepository>, store: Arc<dyn ImageRepository>) -> Self {
        Self { cache, store }
    }
}

#[async_trait]
impl ImageRepository for ReadThroughImageRepository {
    async fn create(&self, account: &Account, image: &Image) -> Result<(), RepoError> {
        if let Err(err) = self.cache.create(account, image).await {
            warn!(
                account = %account,
                uuid = image.uuid(),
                error = %err,
                "cache create failed"
            );
        }
        self.store.create(account, image).await
    }

    async fn get(&self, account: &Account, uuid: &str) -> Result<Image, RepoError> {
        match self.cache.get(account, uuid).await {
            Ok(image) => {
                counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                return Ok(image);
            }
            Err(err) if err.is_not_found() => {
                debug!(account = %account, uuid, "cache miss");
            }
            Err(err) => {
                warn!(account = %account, uuid, error = %err, "cache get failed");
            }
        }
        counter!(METRIC_CACHE_MISS_TOTAL).increment(1);

        let image = self.store.get(account, uuid).await?;

        let cache = Arc::clone(&self.cache);
        let account = account.clone();
        let copy = image.clone();
        tokio::spawn(async move {
            if let Err(err) = cache.create(&account, &copy).await {
                warn!(
                    account = %account,
                    uuid = copy.uuid(),
                    error = %err,
                    "cache repopulation failed"
                );
            }
        });

        Ok(image)
    }

    async fn update(
        &self,
        account: &Account,
        uuid: &str,
        mutator: ImageMutator,
    ) -> Result<Image, RepoError> {
        if let Err(err) = self.cache.update(account, uuid, Arc::clone(&mutator)).await {
            warn!(account = %account, uuid, error = %err, "cache update failed");
        }
        let result = self.store.update(account, uuid, mutator).await;
        if result.is_err() {
            // The cached copy may now be ahead of the store.
            if let Err(err) = self.cache.delete(account, uuid).await {
                warn!(account = %account, uuid, error = %err, "cache invalidation failed");
            }
        }
        result
    }

    async fn delete(&self, account: &Account, uuid: &str) -> Result<(), RepoError> {
        if let Err(err) = self.cache.delete(account, uuid).await {
            warn!(account = %account, uuid, error = %err, "cache delete failed");
        }
        self.store.delete(account, uuid).await
    }

    /// Always served by the durable store; a cache scan is not a consistent view.
    async fn list(&self, account: &Account) -> Result<Vec<Image>, RepoError> {
        self.store.list(account).await
    }
}
