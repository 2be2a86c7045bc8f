use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{
    daily_stat::ActivityKind,
    date::StudyDate,
    ids::{LearnerId, WordId},
};
use crate::scheduler::Transition;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WordRecordError {
    #[error("level, first learn date and next review date must be all set or all unset")]
    PartialProgress,

    #[error("level {provided} is outside 0..={max}")]
    LevelOutOfRange { provided: i64, max: u8 },
}

//
// ─── LEVEL ─────────────────────────────────────────────────────────────────────
//

/// Spaced-repetition stage; an index into the review interval table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Level(u8);

impl Level {
    /// Level every started word begins at, and the floor for demotions.
    pub const FIRST: Level = Level(1);

    #[must_use]
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Level({})", self.0)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Scheduling state of a word that has been started.
///
/// Keeping the three fields together means a record is either fully unstarted
/// or fully scheduled; there is no way to hold a level without a due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub level: Level,
    pub first_learn_date: StudyDate,
    pub next_review_date: StudyDate,
}

//
// ─── WORD RECORD ───────────────────────────────────────────────────────────────
//

/// Per-(learner, word) study state plus its audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
    learner_id: LearnerId,
    word_id: WordId,
    progress: Option<Progress>,
    actual_learn_dates: Vec<StudyDate>,
    actual_review_dates: Vec<StudyDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WordRecord {
    /// A freshly added word that has not been introduced yet.
    #[must_use]
    pub fn new_unstarted(learner_id: LearnerId, word_id: WordId, now: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            word_id,
            progress: None,
            actual_learn_dates: Vec::new(),
            actual_review_dates: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a record from stored columns, checking the all-or-nothing progress rule.
    ///
    /// # Errors
    ///
    /// Returns `WordRecordError::PartialProgress` if only some progress fields are set,
    /// or `WordRecordError::LevelOutOfRange` if the level exceeds `max_level`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        learner_id: LearnerId,
        word_id: WordId,
        level: Option<i64>,
        first_learn_date: Option<StudyDate>,
        next_review_date: Option<StudyDate>,
        actual_learn_dates: Vec<StudyDate>,
        actual_review_dates: Vec<StudyDate>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        max_level: u8,
    ) -> Result<Self, WordRecordError> {
        let progress = match (level, first_learn_date, next_review_date) {
            (None, None, None) => None,
            (Some(raw), Some(first_learn_date), Some(next_review_date)) => {
                let level = u8::try_from(raw)
                    .ok()
                    .filter(|value| *value <= max_level)
                    .ok_or(WordRecordError::LevelOutOfRange {
                        provided: raw,
                        max: max_level,
                    })?;
                Some(Progress {
                    level: Level::new(level),
                    first_learn_date,
                    next_review_date,
                })
            }
            _ => return Err(WordRecordError::PartialProgress),
        };

        Ok(Self {
            learner_id,
            word_id,
            progress,
            actual_learn_dates,
            actual_review_dates,
            created_at,
            updated_at,
        })
    }

    /// Deterministic store key for a (learner, word) pair.
    #[must_use]
    pub fn make_store_key(learner_id: LearnerId, word_id: WordId) -> String {
        format!("{learner_id}_{word_id}")
    }

    #[must_use]
    pub fn store_key(&self) -> String {
        Self::make_store_key(self.learner_id, self.word_id)
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn word_id(&self) -> WordId {
        self.word_id
    }

    #[must_use]
    pub fn progress(&self) -> Option<&Progress> {
        self.progress.as_ref()
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.progress.is_some()
    }

    #[must_use]
    pub fn level(&self) -> Option<Level> {
        self.progress.map(|p| p.level)
    }

    #[must_use]
    pub fn first_learn_date(&self) -> Option<StudyDate> {
        self.progress.map(|p| p.first_learn_date)
    }

    #[must_use]
    pub fn next_review_date(&self) -> Option<StudyDate> {
        self.progress.map(|p| p.next_review_date)
    }

    #[must_use]
    pub fn actual_learn_dates(&self) -> &[StudyDate] {
        &self.actual_learn_dates
    }

    #[must_use]
    pub fn actual_review_dates(&self) -> &[StudyDate] {
        &self.actual_review_dates
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Apply a scheduler transition: new progress, one audit-trail entry, fresh `updated_at`.
    pub fn apply_transition(&mut self, transition: &Transition, now: DateTime<Utc>) {
        self.progress = Some(Progress {
            level: transition.level,
            first_learn_date: transition.first_learn_date,
            next_review_date: transition.next_review_date,
        });
        match transition.activity {
            ActivityKind::Learn => self.actual_learn_dates.push(transition.date),
            ActivityKind::Review => self.actual_review_dates.push(transition.date),
        }
        self.updated_at = now;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn date(s: &str) -> StudyDate {
        s.parse().unwrap()
    }

    #[test]
    fn store_key_is_deterministic_concatenation() {
        let record = WordRecord::new_unstarted(LearnerId::new(7), WordId::new(42), fixed_now());
        assert_eq!(record.store_key(), "7_42");
        assert_eq!(
            WordRecord::make_store_key(LearnerId::new(7), WordId::new(42)),
            record.store_key()
        );
    }

    #[test]
    fn unstarted_record_has_no_progress() {
        let record = WordRecord::new_unstarted(LearnerId::new(1), WordId::new(1), fixed_now());
        assert!(!record.is_started());
        assert_eq!(record.level(), None);
        assert_eq!(record.first_learn_date(), None);
        assert_eq!(record.next_review_date(), None);
    }

    #[test]
    fn from_persisted_rejects_partial_progress() {
        let err = WordRecord::from_persisted(
            LearnerId::new(1),
            WordId::new(1),
            Some(2),
            None,
            Some(date("2024-01-01")),
            Vec::new(),
            Vec::new(),
            fixed_now(),
            fixed_now(),
            6,
        )
        .unwrap_err();
        assert_eq!(err, WordRecordError::PartialProgress);
    }

    #[test]
    fn from_persisted_rejects_level_above_max() {
        let err = WordRecord::from_persisted(
            LearnerId::new(1),
            WordId::new(1),
            Some(9),
            Some(date("2024-01-01")),
            Some(date("2024-01-02")),
            Vec::new(),
            Vec::new(),
            fixed_now(),
            fixed_now(),
            6,
        )
        .unwrap_err();
        assert!(matches!(err, WordRecordError::LevelOutOfRange { provided: 9, max: 6 }));
    }

    #[test]
    fn from_persisted_accepts_full_progress() {
        let record = WordRecord::from_persisted(
            LearnerId::new(1),
            WordId::new(1),
            Some(3),
            Some(date("2024-01-01")),
            Some(date("2024-01-08")),
            vec![date("2024-01-01")],
            vec![date("2024-01-02"), date("2024-01-04")],
            fixed_now(),
            fixed_now(),
            6,
        )
        .unwrap();
        assert_eq!(record.level(), Some(Level::new(3)));
        assert_eq!(record.actual_review_dates().len(), 2);
    }
}
