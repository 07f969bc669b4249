use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Image revision number. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Version(NonZeroU32);

impl Version {
    pub const FIRST: Version = Version(NonZeroU32::MIN);

    pub fn new(number: u32) -> Result<Self, DomainError> {
        NonZeroU32::new(number)
            .map(Self)
            .ok_or(DomainError::InvalidVersion)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    pub(crate) fn bump(&mut self) {
        self.0 = self.0.saturating_add(1);
    }

    /// Step back one revision, never below the first.
    pub(crate) fn step_back(&mut self) {
        if let Some(previous) = NonZeroU32::new(self.0.get() - 1) {
            self.0 = previous;
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::FIRST
    }
}

impl TryFrom<u32> for Version {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Version> for u32 {
    fn from(version: Version) -> Self {
        version.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected() {
        assert_eq!(Version::new(0), Err(DomainError::InvalidVersion));
    }

    #[test]
    fn non_zero_values_serialize_as_plain_numbers() {
        for number in [1_u32, 2, 17, u32::MAX] {
            let version = Version::new(number).expect("non-zero");
            let json = serde_json::to_string(&version).expect("serializable");
            assert_eq!(json, number.to_string());
            let parsed: Version = serde_json::from_str(&json).expect("parsable");
            assert_eq!(parsed, version);
        }
    }

    #[test]
    fn zero_in_json_is_rejected() {
        assert!(serde_json::from_str::<Version>("0").is_err());
    }

    #[test]
    fn step_back_floors_at_one() {
        let mut version = Version::FIRST;
        version.step_back();
        assert_eq!(version.get(), 1);

        version.bump();
        version.bump();
        assert_eq!(version.get(), 3);
        version.step_back();
        assert_eq!(version.get(), 2);
    }
}
