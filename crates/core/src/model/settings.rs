use chrono::FixedOffset;
use thiserror::Error;

use crate::scheduler::{ReviewIntervals, SchedulerError};
use crate::time::DEFAULT_UTC_OFFSET_SECS;

/// Default number of new words a learner may start per day.
pub const DEFAULT_DAILY_NEW_WORDS: u32 = 20;
pub const MIN_DAILY_NEW_WORDS: u32 = 1;
pub const MAX_DAILY_NEW_WORDS: u32 = 100;

/// New-word quota, always within `MIN_DAILY_NEW_WORDS..=MAX_DAILY_NEW_WORDS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DailyLimit(u32);

impl DailyLimit {
    /// Clamp a learner-supplied override into the allowed range.
    #[must_use]
    pub fn clamped(value: u32) -> Self {
        Self(value.clamp(MIN_DAILY_NEW_WORDS, MAX_DAILY_NEW_WORDS))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for DailyLimit {
    fn default() -> Self {
        Self(DEFAULT_DAILY_NEW_WORDS)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("daily new word limit must be between 1 and 100, got {0}")]
    InvalidDailyLimit(u32),

    #[error("UTC offset must be between -12:00 and +14:00, got {0} hours")]
    InvalidUtcOffset(i32),

    #[error(transparent)]
    Intervals(#[from] SchedulerError),
}

/// Validated study configuration shared by every request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StudySettings {
    daily_limit: DailyLimit,
    utc_offset: FixedOffset,
    intervals: ReviewIntervals,
}

/// Unvalidated settings as read from the environment or flags.
#[derive(Clone, Debug, Default)]
pub struct StudySettingsDraft {
    pub daily_new_limit: Option<u32>,
    pub utc_offset_hours: Option<i32>,
    pub review_intervals: Option<Vec<u32>>,
}

impl StudySettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the draft, filling unset fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the limit, offset or interval table is out of range.
    pub fn validate(self) -> Result<StudySettings, SettingsError> {
        let daily_limit = match self.daily_new_limit {
            None => DailyLimit::default(),
            Some(value) if (MIN_DAILY_NEW_WORDS..=MAX_DAILY_NEW_WORDS).contains(&value) => {
                DailyLimit(value)
            }
            Some(value) => return Err(SettingsError::InvalidDailyLimit(value)),
        };

        let utc_offset = match self.utc_offset_hours {
            None => FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS)
                .ok_or(SettingsError::InvalidUtcOffset(DEFAULT_UTC_OFFSET_SECS / 3600))?,
            Some(hours) if (-12..=14).contains(&hours) => FixedOffset::east_opt(hours * 3600)
                .ok_or(SettingsError::InvalidUtcOffset(hours))?,
            Some(hours) => return Err(SettingsError::InvalidUtcOffset(hours)),
        };

        let intervals = match self.review_intervals {
            None => ReviewIntervals::default(),
            Some(days) => ReviewIntervals::new(days)?,
        };

        Ok(StudySettings {
            daily_limit,
            utc_offset,
            intervals,
        })
    }
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            daily_limit: DailyLimit::default(),
            utc_offset: crate::time::Clock::default().offset(),
            intervals: ReviewIntervals::default(),
        }
    }
}

impl StudySettings {
    #[must_use]
    pub fn daily_limit(&self) -> DailyLimit {
        self.daily_limit
    }

    #[must_use]
    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    #[must_use]
    pub fn intervals(&self) -> &ReviewIntervals {
        &self.intervals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_draft_uses_defaults() {
        let settings = StudySettingsDraft::new().validate().unwrap();
        assert_eq!(settings.daily_limit().get(), DEFAULT_DAILY_NEW_WORDS);
        assert_eq!(settings.utc_offset().local_minus_utc(), DEFAULT_UTC_OFFSET_SECS);
        assert_eq!(settings.intervals(), &ReviewIntervals::default());
        assert_eq!(settings, StudySettings::default());
    }

    #[test]
    fn configured_limit_must_be_in_range() {
        let draft = StudySettingsDraft {
            daily_new_limit: Some(0),
            ..StudySettingsDraft::default()
        };
        assert_eq!(draft.validate().unwrap_err(), SettingsError::InvalidDailyLimit(0));

        let draft = StudySettingsDraft {
            daily_new_limit: Some(35),
            ..StudySettingsDraft::default()
        };
        assert_eq!(draft.validate().unwrap().daily_limit().get(), 35);
    }

    #[test]
    fn offset_out_of_range_is_rejected() {
        let draft = StudySettingsDraft {
            utc_offset_hours: Some(15),
            ..StudySettingsDraft::default()
        };
        assert_eq!(draft.validate().unwrap_err(), SettingsError::InvalidUtcOffset(15));
    }

    #[test]
    fn request_overrides_are_clamped() {
        assert_eq!(DailyLimit::clamped(0).get(), MIN_DAILY_NEW_WORDS);
        assert_eq!(DailyLimit::clamped(500).get(), MAX_DAILY_NEW_WORDS);
        assert_eq!(DailyLimit::clamped(12).get(), 12);
    }

    #[test]
    fn bad_interval_table_is_rejected() {
        let draft = StudySettingsDraft {
            review_intervals: Some(vec![1, 0, 3]),
            ..StudySettingsDraft::default()
        };
        assert!(matches!(draft.validate(), Err(SettingsError::Intervals(_))));
    }
}
