use std::time::Duration;

use crate::QueryError;

const HOUR: u32 = 60;
const DAY: u32 = 24 * HOUR;

/// Longest lookback window the backend accepts, in minutes (7 days)
pub const MAX_AGE_MINUTES: u32 = 7 * DAY;

/// Check that a lookback window is positive and at most seven days
pub fn validate_age(age: i64) -> Result<u32, QueryError> {
    if age <= 0 {
        return Err(QueryError::Validation("Age must be positive".into()));
    }
    if age > i64::from(MAX_AGE_MINUTES) {
        return Err(QueryError::Validation(
            "Age cannot be more than 7 days".into(),
        ));
    }
    Ok(age as u32)
}

/// A validated lookback window in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LookbackAge(u32);

impl LookbackAge {
    pub fn new(minutes: i64) -> Result<Self, QueryError> {
        validate_age(minutes).map(Self)
    }

    /// The full seven day window
    pub fn max() -> Self {
        Self(MAX_AGE_MINUTES)
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.0) * 60)
    }
}

impl TryFrom<i64> for LookbackAge {
    type Error = QueryError;

    fn try_from(minutes: i64) -> Result<Self, Self::Error> {
        Self::new(minutes)
    }
}

impl std::fmt::Display for LookbackAge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert_eq!(validate_age(1).unwrap(), 1);
        assert_eq!(validate_age(10080).unwrap(), 10080);
        assert!(matches!(validate_age(10081), Err(QueryError::Validation(_))));
        assert!(matches!(validate_age(0), Err(QueryError::Validation(_))));
        assert!(matches!(validate_age(-5), Err(QueryError::Validation(_))));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(validate_age(10081).unwrap_err().kind(), "ValidationError");
    }

    #[test]
    fn test_lookback_age() {
        let age = LookbackAge::try_from(30).unwrap();
        assert_eq!(age.minutes(), 30);
        assert_eq!(age.as_duration(), Duration::from_secs(1800));
        assert_eq!(age.to_string(), "30m");
        assert_eq!(LookbackAge::max().minutes(), 10080);
    }
}
