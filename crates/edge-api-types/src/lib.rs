//! Request and response bodies for the edge image HTTP API.
//!
//! Field names follow the published OpenAPI document, so a few of them are
//! camel-cased (`sshKey`) while the rest are snake-cased.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Body of `POST /images`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateImageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(
        rename = "sshKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ssh_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_type: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepositoryBody>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryBody {
    pub name: String,
    pub url: String,
}

/// Paired add/remove lists used by the update and upgrade bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRemove {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

/// Body of `PATCH /images/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateImageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: AddRemove,
}

/// Body of `POST /images/{id}/update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpgradeImageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: AddRemove,
    #[serde(default)]
    pub packages: AddRemove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBody {
    pub username: String,
    pub ssh_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerBody {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub iso_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub compose_job_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub checksum: String,
}

/// Public representation of a stored image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResponse {
    pub uuid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub distribution: String,
    pub status: String,
    pub version: u32,
    pub user: UserBody,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_type: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepositoryBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer: Option<InstallerBody>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_at: Option<OffsetDateTime>,
}

/// Body of `GET /images`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageList {
    pub count: usize,
    pub items: Vec<ImageResponse>,
}
