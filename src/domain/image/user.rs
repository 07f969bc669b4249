use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ssh_key::authorized_keys::Entry;

use crate::domain::error::DomainError;

/// Account provisioned on the built image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UserRecord", into = "UserRecord")]
pub struct User {
    username: String,
    ssh_key: String,
}

impl User {
    pub fn new(username: impl Into<String>, ssh_key: impl Into<String>) -> Result<Self, DomainError> {
        let username = username.into();
        let ssh_key = ssh_key.into();
        if username.is_empty() || !is_authorized_key(&ssh_key) {
            return Err(DomainError::InvalidUser);
        }
        Ok(Self { username, ssh_key })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn ssh_key(&self) -> &str {
        &self.ssh_key
    }
}

/// Accepts a single `authorized_keys` line, options and comment included.
fn is_authorized_key(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && Entry::from_str(line).is_ok()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    username: String,
    ssh_key: String,
}

impl TryFrom<UserRecord> for User {
    type Error = DomainError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        Self::new(record.username, record.ssh_key)
    }
}

impl From<User> for UserRecord {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            ssh_key: user.ssh_key,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const VALID_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQDFjRxF1E73z1K9AjltDkuJyGUW3YluTEAW6PvHEZH6vnzNHI+cut716lGGRFHlYk1Fk51Q/92ZlynJ/HqByaK/MJppkQSL4x3KEm6s5ciwXbVEb3ct4waTgqxPD9gy7NN0uzbrhQMillb50yZgox6d9A/JmyRA1Dlai/esrlKfZ4wtSUl+CMsPoVxC6pIsh1YqUWE7S/dvXsQ8V+O7H0sdXAkZMg09kLUOQe3fliTMg6wppW+tb30g4MWAbHSrXksL1TpYjmP0M+stNetO2EIZ07bc8KpQhZybdM8LUhhPGuZXuKzIlwbkDI7C1yLv574wOYCjG/zk7Zu9qO7p6u8x valid@sshkey";

    #[test]
    fn accepts_authorized_key_line() {
        let user = User::new("root", VALID_KEY).expect("valid user");
        assert_eq!(user.username(), "root");
        assert_eq!(user.ssh_key(), VALID_KEY);
    }

    #[test]
    fn rejects_missing_username() {
        assert_eq!(User::new("", VALID_KEY), Err(DomainError::InvalidUser));
    }

    #[test]
    fn rejects_garbage_key() {
        assert_eq!(
            User::new("root", "ssh-rsa not-base64"),
            Err(DomainError::InvalidUser)
        );
        assert_eq!(User::new("root", ""), Err(DomainError::InvalidUser));
    }

    #[test]
    fn json_uses_snake_case_fields() {
        let user = User::new("root", VALID_KEY).expect("valid user");
        let value = serde_json::to_value(&user).expect("serializable");
        assert_eq!(value["username"], "root");
        assert_eq!(value["ssh_key"], VALID_KEY);
    }
}
