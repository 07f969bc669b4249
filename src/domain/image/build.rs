use async_trait::async_trait;

use super::Image;
use crate::domain::error::DomainError;

/// What the image builder reports for an image's current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Pending,
    Succeeded,
    Failed,
}

/// External builder consulted by [`Image::check_for_update`].
#[async_trait]
pub trait BuildStatusCheck: Send + Sync {
    async fn check(&self, image: &Image) -> Result<BuildOutcome, DomainError>;
}
