//! Edge image aggregate.
//!
//! An [`Image`] is only built through [`Image::new`], which validates every
//! field before anything is returned, and it is only changed through the
//! named operations below. The upgrade state machine is:
//!
//! ```text
//! success --upgrade--> building --rollback--> success
//!                      building --build ok--> success
//!                      building --build failed--> error
//! ```
//!
//! A first build that is abandoned (cancelled or timed out) goes to `error`,
//! since there is no earlier version to roll back to.

mod build;
mod distribution;
mod installer;
mod output_type;
mod packages;
mod repos;
mod scope;
mod status;
mod user;
mod version;

pub use build::{BuildOutcome, BuildStatusCheck};
pub use distribution::Distribution;
pub use installer::Installer;
pub use output_type::{OutputType, OutputTypes};
pub use packages::{Packages, REQUIRED_PACKAGES, is_required};
pub use repos::{Repo, RepoRecord, Repos};
pub use scope::ExecutionScope;
pub use status::Status;
pub use user::User;
pub use version::Version;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::DomainError;
use super::name::Name;
use super::tags::Tags;
use super::timing::Timestamps;

/// Ceiling on how long a single upgrade may stay in flight.
pub const UPGRADE_TIMEOUT: Duration = Duration::from_secs(90 * 60);

/// Raw constructor input, validated by [`Image::new`].
#[derive(Debug, Clone, Default)]
pub struct ImageDraft {
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub distribution: String,
    pub status: String,
    pub username: String,
    pub ssh_key: String,
    pub output_types: Vec<String>,
    pub tags: Vec<String>,
    pub packages: Vec<String>,
    pub version: u32,
    pub repos: Vec<RepoRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "ImageDocument", from = "ImageDocument")]
pub struct Image {
    uuid: String,
    name: Name,
    description: String,
    distribution: Distribution,
    status: Status,
    version: Version,
    user: User,
    packages: Packages,
    repos: Repos,
    installer: Installer,
    output_types: OutputTypes,
    tags: Tags,
    timing: Timestamps,
    scope: ExecutionScope,
}

impl Image {
    /// Validates name, user, version, status, repositories and distribution
    /// in that order and stops at the first failure.
    pub fn new(draft: ImageDraft) -> Result<Self, DomainError> {
        let name = Name::new(draft.name)?;
        let user = User::new(draft.username, draft.ssh_key)?;
        let version = Version::new(draft.version)?;
        let status: Status = draft.status.parse()?;
        let repos = draft
            .repos
            .into_iter()
            .map(|record| {
                Repo::new(record.name.clone(), record.url.clone())
                    .ok_or_else(|| DomainError::invalid_repo(record.name, record.url))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let distribution = Distribution::new(draft.distribution)?;

        Ok(Self {
            uuid: draft.uuid,
            name,
            description: draft.description,
            distribution,
            status,
            version,
            user,
            packages: Packages::new(draft.packages),
            repos: Repos::new(repos),
            installer: Installer::default(),
            output_types: OutputTypes::new(draft.output_types),
            tags: Tags::new(draft.tags),
            timing: Timestamps::default(),
            scope: ExecutionScope::new(),
        })
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn packages(&self) -> &Packages {
        &self.packages
    }

    pub fn repos(&self) -> &Repos {
        &self.repos
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    pub fn output_types(&self) -> &OutputTypes {
        &self.output_types
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn timing(&self) -> Timestamps {
        self.timing
    }

    pub fn execution_scope(&self) -> &ExecutionScope {
        &self.scope
    }

    pub fn rename(&mut self, name: Name) {
        self.name = name;
    }

    /// Empty descriptions leave the current one in place.
    pub fn describe(&mut self, description: impl Into<String>) {
        let description = description.into();
        if !description.is_empty() {
            self.description = description;
        }
    }

    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.add(tags);
    }

    pub fn remove_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.remove(tags);
    }

    pub fn add_packages<I, S>(&mut self, packages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages.add(packages);
    }

    /// Required packages in `packages` are ignored.
    pub fn remove_packages<I, S>(&mut self, packages: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.packages.remove(packages);
    }

    pub fn record_installer(&mut self, installer: Installer) {
        self.installer = installer;
    }

    pub fn set_timing(&mut self, timing: Timestamps) {
        self.timing = timing;
    }

    pub fn touch(&mut self, now: OffsetDateTime) {
        self.timing = self.timing.touched(now);
    }

    pub fn is_successful(&self) -> bool {
        self.status.is_success()
    }

    /// Starts a new build of the next version.
    ///
    /// Fails with [`DomainError::AlreadyBuilding`] without touching anything
    /// when a build is already running. Otherwise the previous execution
    /// scope is cancelled and replaced by one bounded by [`UPGRADE_TIMEOUT`].
    pub fn upgrade(&mut self) -> Result<(), DomainError> {
        if self.status.is_building() {
            return Err(DomainError::AlreadyBuilding);
        }
        self.status = Status::Building;
        self.version.bump();
        self.renew_scope();
        Ok(())
    }

    /// Starts the build of a freshly created image under the same
    /// [`UPGRADE_TIMEOUT`] ceiling an upgrade gets.
    pub fn start_first_build(&mut self) {
        self.status = Status::Building;
        self.renew_scope();
    }

    /// Returns to the last known-good version. Never fails.
    pub fn rollback(&mut self) {
        self.scope.cancel();
        self.status = Status::Success;
        self.version.step_back();
    }

    /// Stops the running build without a result from the builder.
    ///
    /// Later versions roll back. The first version has no known-good state to
    /// return to, so it is marked [`Status::Error`] instead.
    pub fn abandon_build(&mut self) {
        if self.version == Version::FIRST {
            self.scope.cancel();
            self.status = Status::Error;
        } else {
            self.rollback();
        }
    }

    fn renew_scope(&mut self) {
        let previous = std::mem::replace(
            &mut self.scope,
            ExecutionScope::with_timeout(UPGRADE_TIMEOUT),
        );
        previous.cancel();
    }

    /// Asks the builder how the current version is doing and applies the answer.
    ///
    /// Collaborator errors are returned as they are.
    pub async fn check_for_update(
        &mut self,
        builds: &dyn BuildStatusCheck,
    ) -> Result<(), DomainError> {
        let outcome = builds.check(self).await?;
        self.apply_build_outcome(outcome)
    }

    pub fn apply_build_outcome(&mut self, outcome: BuildOutcome) -> Result<(), DomainError> {
        match outcome {
            BuildOutcome::Pending => Ok(()),
            BuildOutcome::Succeeded => {
                self.status = Status::Success;
                Ok(())
            }
            BuildOutcome::Failed => {
                self.status = Status::Error;
                Err(DomainError::BuildFailed)
            }
        }
    }
}

impl PartialEq for Image {
    // The execution scope is runtime state, not part of the value.
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
            && self.name == other.name
            && self.description == other.description
            && self.distribution == other.distribution
            && self.status == other.status
            && self.version == other.version
            && self.user == other.user
            && self.packages == other.packages
            && self.repos == other.repos
            && self.installer == other.installer
            && self.output_types == other.output_types
            && self.tags == other.tags
            && self.timing == other.timing
    }
}

/// Self-describing JSON shape used for cache blobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ImageDocument {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    uuid: String,
    name: Name,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
    status: Status,
    version: Version,
    distribution: Distribution,
    user: User,
    #[serde(default)]
    packages: Packages,
    #[serde(default, skip_serializing_if = "Repos::is_empty")]
    repos: Repos,
    #[serde(default, skip_serializing_if = "Installer::is_zero")]
    installer: Installer,
    #[serde(rename = "outputType", default)]
    output_type: OutputTypes,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    tags: Tags,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    created_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    updated_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    deleted_at: Option<OffsetDateTime>,
}

impl From<Image> for ImageDocument {
    fn from(image: Image) -> Self {
        Self {
            uuid: image.uuid,
            name: image.name,
            description: image.description,
            status: image.status,
            version: image.version,
            distribution: image.distribution,
            user: image.user,
            packages: image.packages,
            repos: image.repos,
            installer: image.installer,
            output_type: image.output_types,
            tags: image.tags,
            created_at: image.timing.created_at,
            updated_at: image.timing.updated_at,
            deleted_at: image.timing.deleted_at,
        }
    }
}

impl From<ImageDocument> for Image {
    fn from(document: ImageDocument) -> Self {
        Self {
            uuid: document.uuid,
            name: document.name,
            description: document.description,
            distribution: document.distribution,
            status: document.status,
            version: document.version,
            user: document.user,
            packages: document.packages,
            repos: document.repos,
            installer: document.installer,
            output_types: document.output_type,
            tags: document.tags,
            timing: Timestamps::new(
                document.created_at,
                document.updated_at,
                document.deleted_at,
            ),
            scope: ExecutionScope::new(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use time::macros::datetime;

    use super::user::tests::VALID_KEY;
    use super::*;

    pub(crate) fn draft(uuid: &str) -> ImageDraft {
        ImageDraft {
            uuid: uuid.to_string(),
            name: "edge1".to_string(),
            description: "edge image".to_string(),
            distribution: "rhel8".to_string(),
            status: "building".to_string(),
            username: "root".to_string(),
            ssh_key: VALID_KEY.to_string(),
            version: 1,
            ..ImageDraft::default()
        }
    }

    struct FixedOutcome(Result<BuildOutcome, DomainError>);

    #[async_trait::async_trait]
    impl BuildStatusCheck for FixedOutcome {
        async fn check(&self, _image: &Image) -> Result<BuildOutcome, DomainError> {
            self.0.clone()
        }
    }

    #[test]
    fn construction_stops_at_first_invalid_field() {
        let mut input = draft("u1");
        input.name = " ".into();
        input.version = 0;
        assert_eq!(Image::new(input).err(), Some(DomainError::InvalidName));

        let mut input = draft("u1");
        input.ssh_key = "nope".into();
        input.status = "unknown".into();
        assert_eq!(Image::new(input).err(), Some(DomainError::InvalidUser));

        let mut input = draft("u1");
        input.version = 0;
        input.status = "unknown".into();
        assert_eq!(Image::new(input).err(), Some(DomainError::InvalidVersion));

        let mut input = draft("u1");
        input.status = "unknown".into();
        input.repos = vec![RepoRecord::new("r", "bad")];
        assert_eq!(
            Image::new(input).err(),
            Some(DomainError::invalid_status("unknown"))
        );

        let mut input = draft("u1");
        input.repos = vec![RepoRecord::new("test", "not-a-url")];
        input.distribution = String::new();
        assert_eq!(
            Image::new(input).err(),
            Some(DomainError::invalid_repo("test", "not-a-url"))
        );

        let mut input = draft("u1");
        input.distribution = String::new();
        assert_eq!(Image::new(input).err(), Some(DomainError::InvalidDistribution));
    }

    #[test]
    fn construction_applies_collection_defaults() {
        let mut input = draft("u1");
        input.output_types = vec!["bogus".into()];
        input.packages = vec!["vim".into()];
        input.tags = vec!["a".into(), "a".into()];
        let image = Image::new(input).expect("valid image");

        assert_eq!(image.output_types().to_strings(), vec!["rhel-edge-commit"]);
        assert!(image.packages().has("vim"));
        assert!(image.packages().has("insights-client"));
        assert_eq!(image.tags().len(), 1);
        assert!(image.installer().is_zero());
        assert!(image.timing().is_zero());
    }

    #[test]
    fn upgrade_then_rollback_restores_version() {
        let mut image = Image::new(draft("u1")).expect("valid image");
        image.rollback();
        assert_eq!(image.version().get(), 1);
        assert_eq!(image.status(), Status::Success);

        image.upgrade().expect("upgrade from success");
        assert_eq!(image.version().get(), 2);
        assert_eq!(image.status(), Status::Building);

        image.rollback();
        assert_eq!(image.version().get(), 1);
        assert_eq!(image.status(), Status::Success);
    }

    #[test]
    fn upgrade_while_building_is_rejected_without_side_effects() {
        let mut image = Image::new(draft("u1")).expect("valid image");
        let scope = image.execution_scope().clone();

        assert_eq!(image.upgrade(), Err(DomainError::AlreadyBuilding));
        assert_eq!(image.version().get(), 1);
        assert_eq!(image.status(), Status::Building);
        assert!(!scope.is_cancelled());
        assert!(image.execution_scope().deadline().is_none());
    }

    #[tokio::test]
    async fn upgrade_replaces_and_cancels_previous_scope() {
        let mut image = Image::new(draft("u1")).expect("valid image");
        image.rollback();
        image.upgrade().expect("first upgrade");
        let first = image.execution_scope().clone();
        assert!(first.deadline().is_some());

        image.apply_build_outcome(BuildOutcome::Succeeded).expect("build ok");
        image.upgrade().expect("second upgrade");

        assert!(first.is_cancelled());
        assert!(!image.execution_scope().is_done());
        assert_eq!(image.version().get(), 3);
    }

    #[test]
    fn rollback_cancels_scope() {
        let mut image = Image::new(draft("u1")).expect("valid image");
        image.apply_build_outcome(BuildOutcome::Succeeded).expect("build ok");
        image.upgrade().expect("upgrade");
        let scope = image.execution_scope().clone();

        image.rollback();
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn first_build_is_bounded_like_an_upgrade() {
        let mut image = Image::new(draft("u1")).expect("valid image");
        let unbounded = image.execution_scope().clone();
        assert!(unbounded.deadline().is_none());

        image.start_first_build();
        assert_eq!(image.status(), Status::Building);
        assert_eq!(image.version().get(), 1);
        assert!(image.execution_scope().deadline().is_some());
        assert!(unbounded.is_cancelled());
    }

    #[tokio::test]
    async fn abandoning_first_build_marks_error() {
        let mut image = Image::new(draft("u1")).expect("valid image");
        image.start_first_build();
        let scope = image.execution_scope().clone();

        image.abandon_build();
        assert_eq!(image.status(), Status::Error);
        assert_eq!(image.version().get(), 1);
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn abandoning_later_build_rolls_back() {
        let mut image = Image::new(draft("u1")).expect("valid image");
        image.apply_build_outcome(BuildOutcome::Succeeded).expect("build ok");
        image.upgrade().expect("upgrade");

        image.abandon_build();
        assert_eq!(image.status(), Status::Success);
        assert_eq!(image.version().get(), 1);
    }

    #[test]
    fn required_packages_survive_removal() {
        let mut image = Image::new(draft("u1")).expect("valid image");
        image.add_packages(["vim"]);
        image.remove_packages(["ansible", "vim"]);
        assert!(image.packages().has("ansible"));
        assert!(!image.packages().has("vim"));
    }

    #[test]
    fn describe_ignores_empty_text() {
        let mut image = Image::new(draft("u1")).expect("valid image");
        image.describe("");
        assert_eq!(image.description(), "edge image");
        image.describe("new text");
        assert_eq!(image.description(), "new text");
    }

    #[tokio::test]
    async fn check_for_update_applies_builder_answer() {
        let mut image = Image::new(draft("u1")).expect("valid image");

        image
            .check_for_update(&FixedOutcome(Ok(BuildOutcome::Pending)))
            .await
            .expect("pending is fine");
        assert!(!image.is_successful());

        image
            .check_for_update(&FixedOutcome(Ok(BuildOutcome::Succeeded)))
            .await
            .expect("success");
        assert!(image.is_successful());
    }

    #[tokio::test]
    async fn check_for_update_surfaces_collaborator_errors() {
        let mut image = Image::new(draft("u1")).expect("valid image");
        let failure = DomainError::build_status("builder unreachable");

        let result = image
            .check_for_update(&FixedOutcome(Err(failure.clone())))
            .await;
        assert_eq!(result, Err(failure));
        assert_eq!(image.status(), Status::Building);

        let result = image
            .check_for_update(&FixedOutcome(Ok(BuildOutcome::Failed)))
            .await;
        assert_eq!(result, Err(DomainError::BuildFailed));
        assert!(image.status().is_error());
    }

    #[test]
    fn json_document_round_trips() {
        let mut input = draft("u1");
        input.repos = vec![RepoRecord::new("base", "https://repo.example.com/base")];
        input.tags = vec!["prod".into()];
        input.output_types = vec!["rhel-edge-installer".into()];
        let mut image = Image::new(input).expect("valid image");
        image.set_timing(Timestamps::created(datetime!(2024-05-01 12:00:00.123456789 UTC)));

        let json = serde_json::to_value(&image).expect("serializable");
        assert_eq!(json["uuid"], "u1");
        assert_eq!(json["version"], 1);
        assert_eq!(json["status"], "building");
        assert_eq!(json["created_at"], "2024-05-01T12:00:00.123456789Z");
        assert!(json.get("deleted_at").is_none());
        assert!(json.get("installer").is_none());
        assert_eq!(json["outputType"].as_array().map(Vec::len), Some(2));

        let parsed: Image = serde_json::from_value(json).expect("parsable");
        assert_eq!(parsed, image);
    }

    #[test]
    fn json_document_rejects_zero_version() {
        let image = Image::new(draft("u1")).expect("valid image");
        let mut json = serde_json::to_value(&image).expect("serializable");
        json["version"] = serde_json::json!(0);
        assert!(serde_json::from_value::<Image>(json).is_err());
    }
}
