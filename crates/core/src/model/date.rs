use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A calendar day, always rendered as zero-padded `YYYY-MM-DD`.
///
/// Because the rendering is fixed-width, ordering dates and ordering their
/// string forms agree; storage backends rely on this to compare dates as text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct StudyDate(NaiveDate);

impl StudyDate {
    /// Returns `None` if the components do not form a valid date.
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Offset this date by `days` (negative moves backwards).
    ///
    /// Saturates at the representable bounds instead of panicking.
    #[must_use]
    pub fn add_days(self, days: i64) -> Self {
        let step = Days::new(days.unsigned_abs());
        let shifted = if days >= 0 {
            self.0.checked_add_days(step).unwrap_or(NaiveDate::MAX)
        } else {
            self.0.checked_sub_days(step).unwrap_or(NaiveDate::MIN)
        };
        Self(shifted)
    }

    /// Whole days from `earlier` to `self`; negative when `earlier` is later.
    #[must_use]
    pub fn days_since(self, earlier: StudyDate) -> i64 {
        self.0.signed_duration_since(earlier.0).num_days()
    }

    #[must_use]
    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for StudyDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for StudyDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl fmt::Debug for StudyDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StudyDate({self})")
    }
}

impl FromStr for StudyDate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // chrono accepts unpadded fields; the stored form must be fixed-width.
        if trimmed.len() != 10 {
            return Err(ValidationError::InvalidDate(s.to_owned()));
        }
        NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
            .map(Self)
            .map_err(|_| ValidationError::InvalidDate(s.to_owned()))
    }
}

impl From<StudyDate> for String {
    fn from(date: StudyDate) -> Self {
        date.to_string()
    }
}

impl TryFrom<String> for StudyDate {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
