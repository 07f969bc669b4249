use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Artifact an image build produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutputType {
    /// OSTree commit tarball. Always produced.
    #[serde(rename = "rhel-edge-commit")]
    Commit,
    /// Bootable installer ISO.
    #[serde(rename = "rhel-edge-installer")]
    Installer,
}

impl OutputType {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputType::Commit => "rhel-edge-commit",
            OutputType::Installer => "rhel-edge-installer",
        }
    }

    pub fn is_iso(self) -> bool {
        self == OutputType::Installer
    }

    pub fn is_tar(self) -> bool {
        self == OutputType::Commit
    }
}

impl FromStr for OutputType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "rhel-edge-commit" => Ok(OutputType::Commit),
            "rhel-edge-installer" => Ok(OutputType::Installer),
            other => Err(DomainError::invalid_output_type(other)),
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested outputs. The commit output is always a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct OutputTypes(BTreeSet<OutputType>);

impl OutputTypes {
    /// Unknown names are skipped.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::from([OutputType::Commit]);
        set.extend(
            values
                .into_iter()
                .filter_map(|value| value.as_ref().parse::<OutputType>().ok()),
        );
        Self(set)
    }

    pub fn contains(&self, output: OutputType) -> bool {
        self.0.contains(&output)
    }

    pub fn iter(&self) -> impl Iterator<Item = OutputType> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(|output| output.as_str().to_string()).collect()
    }
}

impl Default for OutputTypes {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}

impl From<Vec<String>> for OutputTypes {
    fn from(values: Vec<String>) -> Self {
        Self::new(values)
    }
}

impl From<OutputTypes> for Vec<String> {
    fn from(outputs: OutputTypes) -> Self {
        outputs.to_strings()
    }
}
