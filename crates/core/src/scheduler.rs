use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::ValidationError;
use crate::model::{ActivityKind, Level, StudyDate, WordId, WordRecord};

/// Days overdue within which a "remember" answer keeps the current level.
pub const GRACE_PERIOD_DAYS: i64 = 2;

/// Day offsets indexed by level. The last slot is effectively "never again".
pub const DEFAULT_REVIEW_INTERVALS: [u32; 7] = [1, 2, 4, 7, 15, 30, 36_500];

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchedulerError {
    #[error("word {word_id} has already been started")]
    AlreadyStarted { word_id: WordId },

    #[error("word {word_id} has not been started yet")]
    NotStarted { word_id: WordId },

    #[error("word {word_id} is not due today ({today}); next review is {next_review_date}")]
    NotDue {
        word_id: WordId,
        next_review_date: StudyDate,
        today: StudyDate,
    },

    #[error("word {word_id} is not overdue on {today}; next review is {next_review_date}")]
    NotOverdue {
        word_id: WordId,
        next_review_date: StudyDate,
        today: StudyDate,
    },

    #[error("invalid review interval table: {0}")]
    InvalidIntervals(String),
}

//
// ─── INTERVALS ─────────────────────────────────────────────────────────────────
//

/// Ordered day offsets, one per level; `MAX_LEVEL` is the last index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewIntervals(Vec<u32>);

impl ReviewIntervals {
    /// Build a custom interval table.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidIntervals` if the table has fewer than two
    /// slots, more than 256 slots, or any slot shorter than one day.
    pub fn new(days: Vec<u32>) -> Result<Self, SchedulerError> {
        if days.len() < 2 {
            return Err(SchedulerError::InvalidIntervals(
                "at least two levels are required".into(),
            ));
        }
        if days.len() > usize::from(u8::MAX) + 1 {
            return Err(SchedulerError::InvalidIntervals(format!(
                "at most 256 levels are supported, got {}",
                days.len()
            )));
        }
        if let Some(pos) = days.iter().position(|d| *d == 0) {
            return Err(SchedulerError::InvalidIntervals(format!(
                "interval at level {pos} must be at least one day"
            )));
        }
        Ok(Self(days))
    }

    /// Terminal mastery level.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn max_level(&self) -> Level {
        // length is bounded to 256 in `new`
        Level::new((self.0.len() - 1) as u8)
    }

    /// Interval for `level`, clamped to the last slot.
    #[must_use]
    pub fn days_for(&self, level: Level) -> u32 {
        let idx = level.index().min(self.0.len() - 1);
        self.0[idx]
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl Default for ReviewIntervals {
    fn default() -> Self {
        Self(DEFAULT_REVIEW_INTERVALS.to_vec())
    }
}

//
// ─── BUCKETS & ACTIONS ─────────────────────────────────────────────────────────
//

/// Mutually exclusive classification of a word relative to "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Never started.
    New,
    /// Started, not mastered, due exactly today.
    Review,
    /// Started, not mastered, due before today.
    Overdue,
}

impl Bucket {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::New => "new",
            Bucket::Review => "review",
            Bucket::Overdue => "overdue",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "review" => Ok(Self::Review),
            "overdue" => Ok(Self::Overdue),
            _ => Err(ValidationError::UnknownBucket(s.to_owned())),
        }
    }
}

/// Bucket of `record` on `today` given the mastery level.
///
/// Storage backends that filter in memory use this so they agree with the
/// scheduler on membership.
#[must_use]
pub fn bucket_of(record: &WordRecord, today: StudyDate, max_level: Level) -> Option<Bucket> {
    let Some(progress) = record.progress() else {
        return Some(Bucket::New);
    };
    if progress.level >= max_level {
        return None;
    }
    match progress.next_review_date.cmp(&today) {
        Ordering::Equal => Some(Bucket::Review),
        Ordering::Less => Some(Bucket::Overdue),
        Ordering::Greater => None,
    }
}

/// What the learner did with a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    /// Introduce an unstarted word.
    Start,
    /// Successful review of a word due today.
    Review,
    /// Overdue word recalled.
    Remember,
    /// Overdue word only partly recalled.
    Vague,
    /// Overdue word not recalled.
    Forgot,
}

impl ReviewAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewAction::Start => "start",
            ReviewAction::Review => "review",
            ReviewAction::Remember => "remember",
            ReviewAction::Vague => "vague",
            ReviewAction::Forgot => "forgot",
        }
    }

    /// Bucket a record must be in for this action to apply.
    #[must_use]
    pub fn required_bucket(self) -> Bucket {
        match self {
            ReviewAction::Start => Bucket::New,
            ReviewAction::Review => Bucket::Review,
            ReviewAction::Remember | ReviewAction::Vague | ReviewAction::Forgot => Bucket::Overdue,
        }
    }

    /// Daily counter this action feeds.
    #[must_use]
    pub fn activity(self) -> ActivityKind {
        match self {
            ReviewAction::Start => ActivityKind::Learn,
            _ => ActivityKind::Review,
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "review" => Ok(Self::Review),
            "remember" => Ok(Self::Remember),
            "vague" => Ok(Self::Vague),
            "forgot" => Ok(Self::Forgot),
            _ => Err(ValidationError::UnknownAction(s.to_owned())),
        }
    }
}

//
// ─── TRANSITION ────────────────────────────────────────────────────────────────
//

/// Result of applying an action to a record on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub action: ReviewAction,
    pub previous_level: Option<Level>,
    pub level: Level,
    pub first_learn_date: StudyDate,
    pub next_review_date: StudyDate,
    /// Day the action happened; appended to the matching audit list.
    pub date: StudyDate,
    pub activity: ActivityKind,
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Level/interval spaced-repetition scheduler.
///
/// Pure decision logic: it never touches storage. Given a record and "today"
/// it classifies the record into a bucket and computes the transition an
/// action produces.
///
/// # Examples
///
/// ```
/// # use vocab_core::scheduler::{Scheduler, Bucket};
/// # use vocab_core::model::{LearnerId, WordId, WordRecord, Level};
/// # use vocab_core::time::fixed_clock;
/// let scheduler = Scheduler::new();
/// let clock = fixed_clock();
/// let today = clock.today();
///
/// let mut record = WordRecord::new_unstarted(LearnerId::new(1), WordId::new(1), clock.now());
/// assert_eq!(scheduler.classify(&record, today), Some(Bucket::New));
///
/// let transition = scheduler.start(&record, today)?;
/// record.apply_transition(&transition, clock.now());
/// assert_eq!(record.level(), Some(Level::new(1)));
/// assert_eq!(record.next_review_date(), Some(today.add_days(2)));
/// # Ok::<(), vocab_core::scheduler::SchedulerError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scheduler {
    intervals: ReviewIntervals,
}

impl Scheduler {
    /// Scheduler with the default interval table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_intervals(intervals: ReviewIntervals) -> Self {
        Self { intervals }
    }

    #[must_use]
    pub fn intervals(&self) -> &ReviewIntervals {
        &self.intervals
    }

    #[must_use]
    pub fn max_level(&self) -> Level {
        self.intervals.max_level()
    }

    /// Bucket of `record` on `today`, or `None` for mastered words and words
    /// scheduled in the future.
    #[must_use]
    pub fn classify(&self, record: &WordRecord, today: StudyDate) -> Option<Bucket> {
        bucket_of(record, today, self.max_level())
    }

    /// Level an action moves a word to.
    ///
    /// `current` is `None` for unstarted words; `overdue_days` only matters for
    /// the remember path. A timely remember leaves the level as stored, level 0
    /// included; every other path lands within `1..=max_level`.
    #[must_use]
    pub fn next_level(
        &self,
        action: ReviewAction,
        current: Option<Level>,
        overdue_days: i64,
    ) -> Level {
        let max = self.max_level().value();
        let current = current.map_or(0, Level::value);
        let demoted = current.saturating_sub(1).max(Level::FIRST.value());

        let next = match action {
            ReviewAction::Start | ReviewAction::Review => current.saturating_add(1).min(max),
            ReviewAction::Remember if overdue_days <= GRACE_PERIOD_DAYS => current,
            ReviewAction::Remember | ReviewAction::Vague => demoted,
            ReviewAction::Forgot => Level::FIRST.value(),
        };
        Level::new(next.min(max))
    }

    /// Due date after moving to `level` on `today`.
    ///
    /// Vague answers are re-tested one interval sooner than a clean recall at
    /// the same level.
    #[must_use]
    pub fn next_review_date(
        &self,
        action: ReviewAction,
        level: Level,
        today: StudyDate,
    ) -> StudyDate {
        let slot = match action {
            ReviewAction::Vague => Level::new(level.value().saturating_sub(1)),
            _ => level,
        };
        today.add_days(i64::from(self.intervals.days_for(slot)))
    }

    /// Introduce an unstarted word.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::AlreadyStarted` if the word has progress.
    pub fn start(&self, record: &WordRecord, today: StudyDate) -> Result<Transition, SchedulerError> {
        if record.is_started() {
            return Err(SchedulerError::AlreadyStarted {
                word_id: record.word_id(),
            });
        }
        let level = self.next_level(ReviewAction::Start, None, 0);
        Ok(Transition {
            action: ReviewAction::Start,
            previous_level: None,
            level,
            first_learn_date: today,
            next_review_date: self.next_review_date(ReviewAction::Start, level, today),
            date: today,
            activity: ActivityKind::Learn,
        })
    }

    /// Successful review of a word due today.
    ///
    /// # Errors
    ///
    /// Returns `NotStarted` for unstarted words and `NotDue` unless the word is
    /// in the review bucket today.
    pub fn review(&self, record: &WordRecord, today: StudyDate) -> Result<Transition, SchedulerError> {
        self.scheduled_transition(ReviewAction::Review, record, today)
    }

    /// Overdue word recalled: keeps its level within the grace period, else drops one.
    ///
    /// # Errors
    ///
    /// Returns `NotStarted` or `NotOverdue` unless the word is overdue today.
    pub fn remember(
        &self,
        record: &WordRecord,
        today: StudyDate,
    ) -> Result<Transition, SchedulerError> {
        self.scheduled_transition(ReviewAction::Remember, record, today)
    }

    /// Overdue word partly recalled: drops one level and comes back sooner.
    ///
    /// # Errors
    ///
    /// Returns `NotStarted` or `NotOverdue` unless the word is overdue today.
    pub fn vague(&self, record: &WordRecord, today: StudyDate) -> Result<Transition, SchedulerError> {
        self.scheduled_transition(ReviewAction::Vague, record, today)
    }

    /// Overdue word forgotten: back to level 1 (not to unstarted).
    ///
    /// # Errors
    ///
    /// Returns `NotStarted` or `NotOverdue` unless the word is overdue today.
    pub fn forgot(&self, record: &WordRecord, today: StudyDate) -> Result<Transition, SchedulerError> {
        self.scheduled_transition(ReviewAction::Forgot, record, today)
    }

    /// Dispatch `action` to its named transition.
    ///
    /// # Errors
    ///
    /// Returns the precondition error of the underlying transition.
    pub fn apply(
        &self,
        action: ReviewAction,
        record: &WordRecord,
        today: StudyDate,
    ) -> Result<Transition, SchedulerError> {
        match action {
            ReviewAction::Start => self.start(record, today),
            ReviewAction::Review => self.review(record, today),
            ReviewAction::Remember => self.remember(record, today),
            ReviewAction::Vague => self.vague(record, today),
            ReviewAction::Forgot => self.forgot(record, today),
        }
    }

    fn scheduled_transition(
        &self,
        action: ReviewAction,
        record: &WordRecord,
        today: StudyDate,
    ) -> Result<Transition, SchedulerError> {
        let progress = record.progress().ok_or(SchedulerError::NotStarted {
            word_id: record.word_id(),
        })?;

        let required = action.required_bucket();
        if self.classify(record, today) != Some(required) {
            let word_id = record.word_id();
            let next_review_date = progress.next_review_date;
            return Err(match required {
                Bucket::Overdue => SchedulerError::NotOverdue {
                    word_id,
                    next_review_date,
                    today,
                },
                Bucket::Review | Bucket::New => SchedulerError::NotDue {
                    word_id,
                    next_review_date,
                    today,
                },
            });
        }

        let overdue_days = today.days_since(progress.next_review_date);
        let level = self.next_level(action, Some(progress.level), overdue_days);

        Ok(Transition {
            action,
            previous_level: Some(progress.level),
            level,
            first_learn_date: progress.first_learn_date,
            next_review_date: self.next_review_date(action, level, today),
            date: today,
            activity: action.activity(),
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
