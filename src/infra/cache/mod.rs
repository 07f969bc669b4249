//! Volatile image cache.
//!
//! Images are stored as JSON blobs under `{account}:image:{uuid}` in a
//! [`KeyValueStore`], each with a hard expiry.

mod images;
mod memory;

pub use images::{CacheImageRepository, DEFAULT_TTL, image_key, image_prefix};
pub use memory::MemoryKvStore;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {message}")]
    Unavailable { message: String },
    #[error("cache operation failed: {message}")]
    Backend { message: String },
}

impl CacheError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Minimal byte-oriented key/value store with per-entry expiry.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Stores `value`, replacing any previous entry and restarting its expiry.
    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    async fn del(&self, key: &str) -> Result<(), CacheError>;

    /// Live keys starting with `prefix`. Not a snapshot.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError>;
}
