use std::collections::HashSet;
use std::sync::Arc;

use edge_images::application::repos::ImageRepository;
use edge_images::infra::cache::{CacheImageRepository, MemoryKvStore};
use edge_images::infra::read_through::{
    METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_MISS_TOTAL, ReadThroughImageRepository,
};
use metrics_util::debugging::DebuggingRecorder;

mod common;

use common::{account, image};

#[tokio::test]
async fn read_through_emits_hit_and_miss_counters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let cache = Arc::new(CacheImageRepository::new(Arc::new(MemoryKvStore::new())));
    let store = Arc::new(CacheImageRepository::new(Arc::new(MemoryKvStore::new())));
    let repo = ReadThroughImageRepository::new(cache.clone(), store.clone());
    let account = account();

    store
        .create(&account, &image("u1", "success"))
        .await
        .expect("seed store");
    cache
        .create(&account, &image("u2", "success"))
        .await
        .expect("seed cache");

    repo.get(&account, "u1").await.expect("miss");
    repo.get(&account, "u2").await.expect("hit");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for metric in [METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_MISS_TOTAL] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
