use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use edge_images::application::images::{CreateImageCommand, ImageService, UpgradeImageCommand};
use edge_images::application::updates::{PoolConfig, UpdatePool, UpdateQueue};
use edge_images::domain::error::DomainError;
use edge_images::domain::image::{BuildOutcome, BuildStatusCheck, Image, Status};
use edge_images::infra::cache::{CacheImageRepository, MemoryKvStore};
use tokio_util::sync::CancellationToken;

mod common;

use common::{SSH_KEY, account};

const POLL: Duration = Duration::from_secs(60);

/// Replays `script` one check at a time and then repeats its last entry.
struct ScriptedBuilds {
    script: Vec<BuildOutcome>,
    checks: AtomicUsize,
}

impl ScriptedBuilds {
    fn new(script: Vec<BuildOutcome>) -> Arc<Self> {
        Arc::new(Self {
            script,
            checks: AtomicUsize::new(0),
        })
    }

    fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildStatusCheck for ScriptedBuilds {
    async fn check(&self, _image: &Image) -> Result<BuildOutcome, DomainError> {
        let index = self.checks.fetch_add(1, Ordering::SeqCst);
        let last = self.script.len().saturating_sub(1);
        Ok(self.script[index.min(last)])
    }
}

struct Harness {
    service: ImageService,
    shutdown: CancellationToken,
    pool: tokio::task::JoinHandle<()>,
}

impl Harness {
    fn start(builds: Arc<ScriptedBuilds>) -> Self {
        // Long enough that nothing expires while the clock is fast-forwarded.
        let kv = Arc::new(MemoryKvStore::new());
        let repo = Arc::new(CacheImageRepository::with_ttl(
            kv,
            Duration::from_secs(24 * 60 * 60),
        ));
        let queue = UpdateQueue::new();
        let service = ImageService::new(repo, builds, queue.clone());

        let config = PoolConfig {
            max_workers: NonZeroUsize::new(2).expect("non-zero"),
            poll_interval: POLL,
        };
        let shutdown = CancellationToken::new();
        let pool = tokio::spawn(UpdatePool::new(queue, config).run(shutdown.clone()));

        Self {
            service,
            shutdown,
            pool,
        }
    }

    async fn create(&self) -> Image {
        self.service
            .create(
                &account(),
                CreateImageCommand {
                    name: "edge1".into(),
                    description: "kiosk image".into(),
                    distribution: "rhel-85".into(),
                    username: "root".into(),
                    ssh_key: SSH_KEY.into(),
                    ..Default::default()
                },
            )
            .await
            .expect("create")
    }

    /// Advances the paused clock in `step`s until `done` holds.
    async fn wait_until(
        &self,
        uuid: &str,
        step: Duration,
        attempts: usize,
        done: impl Fn(&Image) -> bool,
    ) -> Image {
        for _ in 0..attempts {
            let image = self.service.get(&account(), uuid).await.expect("image");
            if done(&image) {
                return image;
            }
            tokio::time::sleep(step).await;
        }
        panic!("image {uuid} never reached the expected state");
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.pool.await.expect("pool task");
    }
}

#[tokio::test(start_paused = true)]
async fn pending_builds_are_polled_until_they_succeed() {
    let builds = ScriptedBuilds::new(vec![
        BuildOutcome::Pending,
        BuildOutcome::Pending,
        BuildOutcome::Succeeded,
    ]);
    let harness = Harness::start(builds.clone());

    let created = harness.create().await;
    let finished = harness
        .wait_until(created.uuid(), Duration::from_secs(30), 20, |image| {
            image.status() == Status::Success
        })
        .await;

    assert_eq!(finished.version().get(), 1);
    assert_eq!(builds.checks(), 3);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_first_build_is_recorded_as_error() {
    let builds = ScriptedBuilds::new(vec![BuildOutcome::Failed]);
    let harness = Harness::start(builds.clone());

    let created = harness.create().await;
    let failed = harness
        .wait_until(created.uuid(), Duration::from_secs(1), 10, |image| {
            image.status() != Status::Building
        })
        .await;

    assert_eq!(failed.status(), Status::Error);
    assert_eq!(failed.version().get(), 1);
    assert_eq!(builds.checks(), 1);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn pending_first_build_gives_up_after_upgrade_timeout() {
    let builds = ScriptedBuilds::new(vec![BuildOutcome::Pending]);
    let harness = Harness::start(builds.clone());

    let created = harness.create().await;
    assert!(created.execution_scope().deadline().is_some());

    let abandoned = harness
        .wait_until(created.uuid(), Duration::from_secs(10 * 60), 12, |image| {
            image.status() != Status::Building
        })
        .await;
    assert_eq!(abandoned.status(), Status::Error);
    assert_eq!(abandoned.version().get(), 1);

    let checks = builds.checks();
    assert!(checks > 2, "pending build was polled");
    tokio::time::sleep(POLL * 5).await;
    assert_eq!(builds.checks(), checks, "abandoned build is no longer polled");
    assert!(harness.service.in_flight().is_empty());
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_upgrade_rolls_back_to_previous_version() {
    let builds = ScriptedBuilds::new(vec![BuildOutcome::Succeeded, BuildOutcome::Failed]);
    let harness = Harness::start(builds.clone());

    let created = harness.create().await;
    harness
        .wait_until(created.uuid(), Duration::from_secs(1), 10, |image| {
            image.status() == Status::Success
        })
        .await;

    harness
        .service
        .upgrade(
            &account(),
            UpgradeImageCommand {
                uuid: created.uuid().to_string(),
                ..Default::default()
            },
        )
        .await
        .expect("upgrade");

    let rolled_back = harness
        .wait_until(created.uuid(), Duration::from_secs(1), 10, |image| {
            image.status() == Status::Success && builds.checks() >= 2
        })
        .await;
    assert_eq!(rolled_back.version().get(), 1);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn expired_upgrade_rolls_back() {
    let builds = ScriptedBuilds::new(vec![BuildOutcome::Succeeded, BuildOutcome::Pending]);
    let harness = Harness::start(builds.clone());

    let created = harness.create().await;
    harness
        .wait_until(created.uuid(), Duration::from_secs(1), 10, |image| {
            image.status() == Status::Success
        })
        .await;

    harness
        .service
        .upgrade(
            &account(),
            UpgradeImageCommand {
                uuid: created.uuid().to_string(),
                ..Default::default()
            },
        )
        .await
        .expect("upgrade");

    let building = harness.service.get(&account(), created.uuid()).await.expect("image");
    assert_eq!(building.version().get(), 2);

    // The upgrade scope lasts 90 minutes.
    let rolled_back = harness
        .wait_until(created.uuid(), Duration::from_secs(10 * 60), 12, |image| {
            image.status() == Status::Success
        })
        .await;
    assert_eq!(rolled_back.version().get(), 1);
    assert!(builds.checks() > 2, "pending build was polled");
    harness.stop().await;
}

#[tokio::test]
async fn pool_stops_on_shutdown() {
    let harness = Harness::start(ScriptedBuilds::new(vec![BuildOutcome::Pending]));
    harness.stop().await;
}
