use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};

use crate::model::StudyDate;

/// Offset used to decide what "today" is when none is configured (UTC+08:00).
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Where the clock reads the current instant from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeSource {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

/// A clock pinned to a single UTC offset.
///
/// Every learner and every query must agree on the calendar day, so `today()`
/// is derived from the configured offset and never from the host's local zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    source: TimeSource,
    offset: FixedOffset,
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            source: TimeSource::System,
            offset: default_offset(),
        }
    }
}

fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::default()
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self {
            source: TimeSource::Fixed(at),
            offset: default_offset(),
        }
    }

    /// Replace the offset used to compute calendar dates.
    #[must_use]
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self.source {
            TimeSource::System => Utc::now(),
            TimeSource::Fixed(t) => t,
        }
    }

    /// Calendar date of `now()` in the configured offset.
    #[must_use]
    pub fn today(&self) -> StudyDate {
        StudyDate::from(self.now().with_timezone(&self.offset).date_naive())
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on a system clock.
    pub fn advance(&mut self, delta: Duration) {
        if let TimeSource::Fixed(t) = &mut self.source {
            *t += delta;
        }
    }

    /// Returns true if this clock is fixed.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self.source, TimeSource::Fixed(_))
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
///
/// In the default UTC+08:00 offset this is already 2023-11-15.
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

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn today_uses_configured_offset_not_utc() {
        let clock = fixed_clock();
        assert_eq!(clock.today().to_string(), "2023-11-15");

        let utc = clock.with_offset(Utc.fix());
        assert_eq!(utc.today().to_string(), "2023-11-14");

        let west = clock.with_offset(FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(west.today().to_string(), "2023-11-14");
    }

    #[test]
    fn advance_moves_fixed_clock_across_days() {
        let mut clock = fixed_clock();
        let before = clock.today();
        clock.advance(Duration::days(3));
        assert_eq!(clock.today(), before.add_days(3));
        assert_eq!(clock.today().days_since(before), 3);
    }

    #[test]
    fn advance_is_noop_for_system_clock() {
        let mut clock = Clock::default_clock();
        clock.advance(Duration::days(10));
        assert!(!clock.is_fixed());
        assert_eq!(clock.offset(), default_offset());
    }
}
