//! Tenant identifier carried by every repository call.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Account used when identity checks are disabled.
pub const DEFAULT_ACCOUNT: &str = "0000000";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account(String);

impl Account {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() || value.contains(':') {
            return Err(DomainError::invalid_account(value));
        }
        Ok(Self(value))
    }

    pub fn default_account() -> Self {
        Self(DEFAULT_ACCOUNT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Account {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.0
    }
}
