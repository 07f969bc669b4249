use time::OffsetDateTime;

/// Lifecycle timestamps. `None` stands for "never happened".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamps {
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
    pub deleted_at: Option<OffsetDateTime>,
}

impl Timestamps {
    pub fn new(
        created_at: Option<OffsetDateTime>,
        updated_at: Option<OffsetDateTime>,
        deleted_at: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            created_at,
            updated_at,
            deleted_at,
        }
    }

    /// Fresh timestamps for a record created at `now`.
    pub fn created(now: OffsetDateTime) -> Self {
        Self::new(Some(now), Some(now), None)
    }

    pub fn is_zero(&self) -> bool {
        self.created_at.is_none() && self.updated_at.is_none() && self.deleted_at.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn touched(self, now: OffsetDateTime) -> Self {
        Self {
            updated_at: Some(now),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn created_is_not_deleted() {
        let now = datetime!(2024-03-01 10:00 UTC);
        let timing = Timestamps::created(now);
        assert!(!timing.is_zero());
        assert!(!timing.is_deleted());
        assert_eq!(timing.updated_at, Some(now));
    }

    #[test]
    fn touched_keeps_creation_time() {
        let created = datetime!(2024-03-01 10:00 UTC);
        let later = datetime!(2024-03-02 08:30 UTC);
        let timing = Timestamps::created(created).touched(later);
        assert_eq!(timing.created_at, Some(created));
        assert_eq!(timing.updated_at, Some(later));
    }
}
