use serde::{Deserialize, Serialize};

/// ISO build metadata. Empty until a build records one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installer {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    iso_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    compose_job_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    checksum: String,
}

impl Installer {
    pub fn new(
        iso_url: impl Into<String>,
        compose_job_id: impl Into<String>,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            iso_url: iso_url.into(),
            compose_job_id: compose_job_id.into(),
            checksum: checksum.into(),
        }
    }

    pub fn iso_url(&self) -> &str {
        &self.iso_url
    }

    pub fn compose_job_id(&self) -> &str {
        &self.compose_job_id
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn is_zero(&self) -> bool {
        self.iso_url.is_empty() && self.compose_job_id.is_empty() && self.checksum.is_empty()
    }
}
