use chrono::{DateTime, Utc};

/// Source of "now" for services; tests pin it with [`Clock::Fixed`].
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }
}

/// Remaining time below which a countdown should be shown as urgent (5 minutes).
pub const LOW_TIME_THRESHOLD_SECS: u32 = 300;

/// Formats a countdown as `m:ss` (minutes are not wrapped into hours).
#[must_use]
pub fn format_countdown(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Returns true once a countdown has dropped under [`LOW_TIME_THRESHOLD_SECS`].
#[must_use]
pub fn is_low_time(seconds: u32) -> bool {
    seconds < LOW_TIME_THRESHOLD_SECS
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_is_zero_padded() {
        assert_eq!(format_countdown(0), "0:00");
        assert_eq!(format_countdown(65), "1:05");
        assert_eq!(format_countdown(30 * 60), "30:00");
    }

    #[test]
    fn low_time_threshold_is_exclusive() {
        assert!(!is_low_time(300));
        assert!(is_low_time(299));
    }

    #[test]
    fn fixed_clock_is_pinned() {
        let clock = Clock::fixed(fixed_now());
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().timestamp(), FIXED_TEST_TIMESTAMP);
        assert!(matches!(Clock::default(), Clock::System));
    }
}
