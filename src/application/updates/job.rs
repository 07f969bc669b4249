use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::info;

use super::in_flight::InFlightGuard;
use super::{Scoped, Updatable, UpdateError};
use crate::application::repos::{ImageMutator, ImageRepository, mutator};
use crate::domain::account::Account;
use crate::domain::image::{BuildOutcome, BuildStatusCheck, ExecutionScope, Image, Version};

/// Tracks one image build and writes its outcome back to the repository.
pub struct ImageUpdateJob {
    account: Account,
    image: Image,
    repo: Arc<dyn ImageRepository>,
    builds: Arc<dyn BuildStatusCheck>,
    guard: Option<InFlightGuard>,
}

impl ImageUpdateJob {
    /// `image` is the stored image whose current version is being built.
    pub fn new(
        account: Account,
        image: Image,
        repo: Arc<dyn ImageRepository>,
        builds: Arc<dyn BuildStatusCheck>,
    ) -> Self {
        Self {
            account,
            image,
            repo,
            builds,
            guard: None,
        }
    }

    /// Keeps the in-flight registration alive for as long as the job exists.
    pub fn with_guard(mut self, guard: InFlightGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Writes `change` to the stored image, but only while the store still
    /// shows `version` building. A cancel or newer upgrade that got there
    /// first is left alone.
    async fn persist_if_current(
        &self,
        version: Version,
        change: fn(&mut Image),
    ) -> Result<(), UpdateError> {
        let apply: ImageMutator = mutator(move |mut stored: Image| {
            if stored.version() == version && stored.status().is_building() {
                change(&mut stored);
                stored.touch(OffsetDateTime::now_utc());
            }
            Ok(stored)
        });
        self.repo
            .update(&self.account, self.image.uuid(), apply)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Updatable for ImageUpdateJob {
    fn is_successful(&self) -> bool {
        self.image.is_successful()
    }

    async fn upgrade(&mut self) -> Result<(), UpdateError> {
        self.image.upgrade()?;
        let upgraded = self
            .repo
            .update(
                &self.account,
                self.image.uuid(),
                mutator(|mut stored: Image| {
                    stored.upgrade()?;
                    stored.touch(OffsetDateTime::now_utc());
                    Ok(stored)
                }),
            )
            .await;
        if let Err(err) = upgraded {
            self.image.rollback();
            return Err(err.into());
        }
        if let Some(guard) = &self.guard {
            guard.rebind(self.image.execution_scope().clone());
        }
        Ok(())
    }

    async fn check_for_update(&mut self) -> Result<(), UpdateError> {
        self.image.check_for_update(self.builds.as_ref()).await?;
        if self.image.is_successful() {
            self.persist_if_current(self.image.version(), |stored| {
                // Succeeded never fails.
                let _ = stored.apply_build_outcome(BuildOutcome::Succeeded);
            })
            .await?;
            info!(
                account = %self.account,
                uuid = self.image.uuid(),
                version = self.image.version().get(),
                "image build succeeded"
            );
        }
        Ok(())
    }

    /// Abandons the tracked build. A first build is recorded as `error`,
    /// later versions roll back to the one before.
    async fn rollback(&mut self) -> Result<(), UpdateError> {
        let tracked = self.image.version();
        self.image.abandon_build();
        self.persist_if_current(tracked, Image::abandon_build).await?;
        info!(
            account = %self.account,
            uuid = self.image.uuid(),
            version = self.image.version().get(),
            status = self.image.status().as_str(),
            "image build abandoned"
        );
        Ok(())
    }
}

impl Scoped for ImageUpdateJob {
    fn execution_scope(&self) -> &ExecutionScope {
        self.image.execution_scope()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::RepoError;
    use crate::application::updates::InFlightUpgrades;
    use crate::domain::image::Status;
    use crate::domain::image::tests::draft;
    use crate::infra::build_status::ImmediateBuildStatus;
    use crate::infra::cache::{CacheImageRepository, MemoryKvStore};

    fn account() -> Account {
        Account::new("0000000").expect("valid account")
    }

    fn repo() -> Arc<CacheImageRepository> {
        Arc::new(CacheImageRepository::new(Arc::new(MemoryKvStore::new())))
    }

    fn built_image(uuid: &str) -> Image {
        let mut image = Image::new(draft(uuid)).expect("valid image");
        image
            .apply_build_outcome(BuildOutcome::Succeeded)
            .expect("build ok");
        image
    }

    #[tokio::test]
    async fn upgrade_persists_next_version_and_rebinds_registry() {
        let repo = repo();
        let image = built_image("u1");
        repo.create(&account(), &image).await.expect("create");

        let registry = InFlightUpgrades::new();
        let guard = registry.register(&account(), "u1", image.execution_scope().clone());
        let mut job = ImageUpdateJob::new(
            account(),
            image,
            repo.clone(),
            Arc::new(ImmediateBuildStatus),
        )
        .with_guard(guard);

        job.upgrade().await.expect("upgrade");

        let stored = repo.get(&account(), "u1").await.expect("stored");
        assert_eq!(stored.version().get(), 2);
        assert_eq!(stored.status(), Status::Building);
        assert_eq!(job.image().version().get(), 2);

        // Cancelling through the registry must reach the new scope.
        assert!(!job.execution_scope().is_cancelled());
        assert!(registry.cancel(&account(), "u1"));
        assert!(job.execution_scope().is_cancelled());
    }

    #[tokio::test]
    async fn failed_store_update_rolls_local_image_back() {
        let repo = repo();
        let mut job = ImageUpdateJob::new(
            account(),
            built_image("missing"),
            repo.clone(),
            Arc::new(ImmediateBuildStatus),
        );

        let err = job.upgrade().await.expect_err("nothing stored");

        assert!(matches!(err, UpdateError::Repo(RepoError::NotFound)));
        assert_eq!(job.image().version().get(), 1);
        assert_eq!(job.image().status(), Status::Success);
    }

    #[tokio::test]
    async fn rolling_back_first_build_stores_error() {
        let repo = repo();
        let mut image = Image::new(draft("u1")).expect("valid image");
        image.start_first_build();
        repo.create(&account(), &image).await.expect("create");

        let mut job =
            ImageUpdateJob::new(account(), image, repo.clone(), Arc::new(ImmediateBuildStatus));
        job.rollback().await.expect("rollback");

        let stored = repo.get(&account(), "u1").await.expect("stored");
        assert_eq!(stored.status(), Status::Error);
        assert_eq!(stored.version().get(), 1);
        assert!(!job.is_successful());
    }

    #[tokio::test]
    async fn rollback_leaves_newer_version_alone() {
        let repo = repo();
        let mut image = built_image("u1");
        image.upgrade().expect("upgrade");
        repo.create(&account(), &image).await.expect("create");

        let mut job = ImageUpdateJob::new(
            account(),
            image.clone(),
            repo.clone(),
            Arc::new(ImmediateBuildStatus),
        );
        repo.update(
            &account(),
            "u1",
            mutator(|mut stored: Image| {
                stored.apply_build_outcome(BuildOutcome::Succeeded)?;
                stored.upgrade()?;
                Ok(stored)
            }),
        )
        .await
        .expect("newer upgrade");

        job.rollback().await.expect("rollback");

        let stored = repo.get(&account(), "u1").await.expect("stored");
        assert_eq!(stored.version().get(), 3);
        assert_eq!(stored.status(), Status::Building);
    }
}
