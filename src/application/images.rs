use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::repos::{ImageRepository, RepoError, mutator};
use crate::application::updates::{ImageUpdateJob, InFlightUpgrades, QueueClosed, UpdateQueue};
use crate::domain::account::Account;
use crate::domain::error::DomainError;
use crate::domain::image::{BuildStatusCheck, Image, ImageDraft, RepoRecord, Status};
use crate::domain::name::Name;
use crate::domain::timing::Timestamps;

#[derive(Debug, Error)]
pub enum ImageServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Queue(#[from] QueueClosed),
}

impl ImageServiceError {
    /// The domain error behind this failure, if any, including one raised
    /// inside a repository mutator.
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ImageServiceError::Domain(err) | ImageServiceError::Repo(RepoError::Domain(err)) => {
                Some(err)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateImageCommand {
    pub name: String,
    pub description: String,
    pub distribution: String,
    pub username: String,
    pub ssh_key: String,
    pub output_types: Vec<String>,
    pub tags: Vec<String>,
    pub packages: Vec<String>,
    pub repos: Vec<RepoRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateImageCommand {
    pub uuid: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags_to_add: Vec<String>,
    pub tags_to_remove: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpgradeImageCommand {
    pub uuid: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags_to_add: Vec<String>,
    pub tags_to_remove: Vec<String>,
    pub packages_to_add: Vec<String>,
    pub packages_to_remove: Vec<String>,
}

/// Image commands and queries on top of an [`ImageRepository`].
#[derive(Clone)]
pub struct ImageService {
    repo: Arc<dyn ImageRepository>,
    builds: Arc<dyn BuildStatusCheck>,
    updates: UpdateQueue<ImageUpdateJob>,
    in_flight: InFlightUpgrades,
}

impl ImageService {
    pub fn new(
        repo: Arc<dyn ImageRepository>,
        builds: Arc<dyn BuildStatusCheck>,
        updates: UpdateQueue<ImageUpdateJob>,
    ) -> Self {
        Self {
            repo,
            builds,
            updates,
            in_flight: InFlightUpgrades::new(),
        }
    }

    pub fn in_flight(&self) -> &InFlightUpgrades {
        &self.in_flight
    }

    pub async fn create(
        &self,
        account: &Account,
        command: CreateImageCommand,
    ) -> Result<Image, ImageServiceError> {
        let uuid = Uuid::new_v4().to_string();
        let result = self.create_inner(account, uuid.clone(), command).await;
        log_command("create_image", account, &uuid, &result);
        result
    }

    async fn create_inner(
        &self,
        account: &Account,
        uuid: String,
        command: CreateImageCommand,
    ) -> Result<Image, ImageServiceError> {
        let mut image = Image::new(ImageDraft {
            uuid,
            name: command.name,
            description: command.description,
            distribution: command.distribution,
            status: Status::Building.as_str().to_string(),
            username: command.username,
            ssh_key: command.ssh_key,
            output_types: command.output_types,
            tags: command.tags,
            packages: command.packages,
            version: 1,
            repos: command.repos,
        })?;
        image.set_timing(Timestamps::created(OffsetDateTime::now_utc()));
        image.start_first_build();

        self.repo.create(account, &image).await?;
        self.track(account, image.clone())?;
        Ok(image)
    }

    pub async fn update(
        &self,
        account: &Account,
        command: UpdateImageCommand,
    ) -> Result<(), ImageServiceError> {
        let uuid = command.uuid.clone();
        let result = self.update_inner(account, command).await;
        log_command("update_image", account, &uuid, &result);
        result
    }

    async fn update_inner(
        &self,
        account: &Account,
        command: UpdateImageCommand,
    ) -> Result<(), ImageServiceError> {
        let name = command.name.map(Name::new).transpose()?;
        let UpdateImageCommand {
            uuid,
            description,
            tags_to_add,
            tags_to_remove,
            ..
        } = command;

        let apply = mutator(move |mut image: Image| {
            edit_metadata(&mut image, name.clone(), description.as_deref());
            image.remove_tags(&tags_to_remove);
            image.add_tags(tags_to_add.iter().cloned());
            image.touch(OffsetDateTime::now_utc());
            Ok(image)
        });
        self.repo.update(account, &uuid, apply).await?;
        Ok(())
    }

    /// Applies the requested edits, starts a build of the next version and
    /// hands it to the update pool.
    pub async fn upgrade(
        &self,
        account: &Account,
        command: UpgradeImageCommand,
    ) -> Result<(), ImageServiceError> {
        let uuid = command.uuid.clone();
        let result = self.upgrade_inner(account, command).await;
        log_command("upgrade_image", account, &uuid, &result);
        result
    }

    async fn upgrade_inner(
        &self,
        account: &Account,
        command: UpgradeImageCommand,
    ) -> Result<(), ImageServiceError> {
        let name = command.name.map(Name::new).transpose()?;
        let UpgradeImageCommand {
            uuid,
            description,
            tags_to_add,
            tags_to_remove,
            packages_to_add,
            packages_to_remove,
            ..
        } = command;

        let apply = mutator(move |mut image: Image| {
            edit_metadata(&mut image, name.clone(), description.as_deref());
            image.remove_tags(&tags_to_remove);
            image.add_tags(tags_to_add.iter().cloned());
            image.remove_packages(&packages_to_remove);
            image.add_packages(packages_to_add.iter().cloned());
            image.upgrade()?;
            image.touch(OffsetDateTime::now_utc());
            Ok(image)
        });
        let upgraded = self.repo.update(account, &uuid, apply).await?;
        self.track(account, upgraded)?;
        Ok(())
    }

    /// Stops the in-flight build, if any, and rolls the image back to its
    /// previous version. A first build has nothing to return to and ends in
    /// `error`. Images that are not building are left untouched.
    pub async fn cancel_upgrade(
        &self,
        account: &Account,
        uuid: &str,
    ) -> Result<(), ImageServiceError> {
        let result = self.cancel_upgrade_inner(account, uuid).await;
        log_command("cancel_upgrade_image", account, uuid, &result);
        result
    }

    async fn cancel_upgrade_inner(
        &self,
        account: &Account,
        uuid: &str,
    ) -> Result<(), ImageServiceError> {
        if !self.in_flight.cancel(account, uuid) {
            debug!(
                target = "application::images::cancel_upgrade",
                account = %account,
                uuid,
                "no in-flight upgrade registered"
            );
        }

        let apply = mutator(|mut image: Image| {
            if image.status().is_building() {
                image.abandon_build();
                image.touch(OffsetDateTime::now_utc());
            }
            Ok(image)
        });
        self.repo.update(account, uuid, apply).await?;
        Ok(())
    }

    pub async fn delete(&self, account: &Account, uuid: &str) -> Result<(), ImageServiceError> {
        self.in_flight.cancel(account, uuid);
        let result = self
            .repo
            .delete(account, uuid)
            .await
            .map_err(ImageServiceError::from);
        log_command("delete_image", account, uuid, &result);
        result
    }

    pub async fn get(&self, account: &Account, uuid: &str) -> Result<Image, ImageServiceError> {
        let started = Instant::now();
        let result = self
            .repo
            .get(account, uuid)
            .await
            .map_err(ImageServiceError::from);
        log_query("get_image", account, started, &result);
        result
    }

    pub async fn list(&self, account: &Account) -> Result<Vec<Image>, ImageServiceError> {
        let started = Instant::now();
        let result = self
            .repo
            .list(account)
            .await
            .map_err(ImageServiceError::from);
        log_query("list_images", account, started, &result);
        result
    }

    fn track(&self, account: &Account, image: Image) -> Result<(), ImageServiceError> {
        let guard = self
            .in_flight
            .register(account, image.uuid(), image.execution_scope().clone());
        let job = ImageUpdateJob::new(
            account.clone(),
            image,
            Arc::clone(&self.repo),
            Arc::clone(&self.builds),
        )
        .with_guard(guard);
        self.updates.add(job)?;
        Ok(())
    }
}

fn edit_metadata(image: &mut Image, name: Option<Name>, description: Option<&str>) {
    if let Some(name) = name {
        image.rename(name);
    }
    if let Some(description) = description {
        image.describe(description);
    }
}

fn log_command<T>(
    command: &'static str,
    account: &Account,
    uuid: &str,
    result: &Result<T, ImageServiceError>,
) {
    match result {
        Ok(_) => info!(
            target = "application::images",
            command,
            account = %account,
            uuid,
            "command executed"
        ),
        Err(err) => warn!(
            target = "application::images",
            command,
            account = %account,
            uuid,
            error = %err,
            "command failed"
        ),
    }
}

fn log_query<T>(
    query: &'static str,
    account: &Account,
    started: Instant,
    result: &Result<T, ImageServiceError>,
) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(_) => debug!(
            target = "application::images",
            query,
            account = %account,
            elapsed_ms,
            "query executed"
        ),
        Err(err) => warn!(
            target = "application::images",
            query,
            account = %account,
            elapsed_ms,
            error = %err,
            "query failed"
        ),
    }
}
