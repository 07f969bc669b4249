use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{CacheError, KeyValueStore};

#[derive(Clone)]
struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

/// In-process [`KeyValueStore`]. Expired entries are dropped lazily on access.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until next touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now().checked_add(ttl);
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|item| item.key().starts_with(prefix))
            .map(|item| item.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryKvStore::new();
        store
            .set_ex("k", Bytes::from_static(b"v"), Duration::from_secs(600))
            .await
            .expect("set");

        tokio::time::advance(Duration::from_secs(599)).await;
        assert_eq!(
            store.get("k").await.expect("get"),
            Some(Bytes::from_static(b"v"))
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("k").await.expect("get"), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reads_do_not_extend_expiry() {
        let store = MemoryKvStore::new();
        store
            .set_ex("k", Bytes::from_static(b"v"), Duration::from_secs(10))
            .await
            .expect("set");
        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(4)).await;
            let _ = store.get("k").await.expect("get");
        }
        assert_eq!(store.get("k").await.expect("get"), None);
    }

    #[tokio::test]
    async fn scan_prefix_lists_matching_keys() {
        let store = MemoryKvStore::new();
        let ttl = Duration::from_secs(60);
        for key in ["a:image:2", "a:image:1", "b:image:1"] {
            store
                .set_ex(key, Bytes::from_static(b"{}"), ttl)
                .await
                .expect("set");
        }

        let keys = store.scan_prefix("a:image:").await.expect("scan");
        assert_eq!(keys, vec!["a:image:1", "a:image:2"]);

        store.del("a:image:1").await.expect("del");
        assert_eq!(store.scan_prefix("a:image:").await.expect("scan").len(), 1);
    }
}
