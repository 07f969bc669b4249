use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Build state of an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Building,
    Success,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Building => "building",
            Status::Success => "success",
            Status::Error => "error",
        }
    }

    pub fn is_building(self) -> bool {
        self == Status::Building
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    pub fn is_error(self) -> bool {
        self == Status::Error
    }
}

impl FromStr for Status {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "building" => Ok(Status::Building),
            "success" => Ok(Status::Success),
            "error" => Ok(Status::Error),
            other => Err(DomainError::invalid_status(other)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
