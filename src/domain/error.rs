use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("invalid name")]
    InvalidName,
    #[error("invalid user")]
    InvalidUser,
    #[error("invalid version")]
    InvalidVersion,
    #[error("invalid status `{value}`")]
    InvalidStatus { value: String },
    #[error("invalid output type `{value}`")]
    InvalidOutputType { value: String },
    #[error("invalid repository `{name}` with url `{url}`")]
    InvalidRepo { name: String, url: String },
    #[error("invalid distribution")]
    InvalidDistribution,
    #[error("invalid account: {value}")]
    InvalidAccount { value: String },
    #[error("no account found for request")]
    NoAccount,
    #[error("image already building")]
    AlreadyBuilding,
    #[error("image build failed")]
    BuildFailed,
    #[error("build status check failed: {message}")]
    BuildStatus { message: String },
}

impl DomainError {
    pub fn invalid_status(value: impl Into<String>) -> Self {
        Self::InvalidStatus {
            value: value.into(),
        }
    }

    pub fn invalid_output_type(value: impl Into<String>) -> Self {
        Self::InvalidOutputType {
            value: value.into(),
        }
    }

    pub fn invalid_repo(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::InvalidRepo {
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn invalid_account(value: impl Into<String>) -> Self {
        Self::InvalidAccount {
            value: value.into(),
        }
    }

    pub fn build_status(message: impl Into<String>) -> Self {
        Self::BuildStatus {
            message: message.into(),
        }
    }

    /// Errors caused by caller input rather than by state or infrastructure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidName
                | DomainError::InvalidUser
                | DomainError::InvalidVersion
                | DomainError::InvalidStatus { .. }
                | DomainError::InvalidOutputType { .. }
                | DomainError::InvalidRepo { .. }
                | DomainError::InvalidDistribution
                | DomainError::InvalidAccount { .. }
                | DomainError::NoAccount
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::AlreadyBuilding)
    }
}
