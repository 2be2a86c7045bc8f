use std::collections::HashMap;
use std::sync::Arc;

use storage::repository::{DailyStatRepository, StorageError};
use vocab_core::model::{
    ActivityKind, DailyStat, DateRange, HeatmapCell, HeatmapThresholds, LearnerId, StudyDate,
};

use vocab_core::ValidationError;

use crate::Clock;
use crate::error::StudyServiceError;

/// Days covered by a stats query when no start date is given, today included.
pub const DEFAULT_STATS_WINDOW_DAYS: i64 = 365;

/// Longest range a heatmap may cover, both ends included.
pub const MAX_HEATMAP_DAYS: u32 = 366;

/// Per-day activity counters and the heatmap view derived from them.
#[derive(Clone)]
pub struct StatsService {
    clock: Clock,
    stats: Arc<dyn DailyStatRepository>,
    thresholds: HeatmapThresholds,
}

impl StatsService {
    #[must_use]
    pub fn new(clock: Clock, stats: Arc<dyn DailyStatRepository>) -> Self {
        Self {
            clock,
            stats,
            thresholds: HeatmapThresholds::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: HeatmapThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Count one action on `date`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the counters cannot be written.
    pub async fn record_action(
        &self,
        learner_id: LearnerId,
        date: StudyDate,
        kind: ActivityKind,
    ) -> Result<DailyStat, StorageError> {
        self.stats.increment(learner_id, date, kind).await
    }

    /// Like `record_action`, but a failure is logged and handed back instead
    /// of failing the caller.
    pub async fn record_action_best_effort(
        &self,
        learner_id: LearnerId,
        date: StudyDate,
        kind: ActivityKind,
    ) -> Option<StorageError> {
        match self.record_action(learner_id, date, kind).await {
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(
                    learner = %learner_id,
                    %date,
                    kind = kind.as_str(),
                    error = %err,
                    "failed to update daily stats"
                );
                Some(err)
            }
        }
    }

    /// Resolve optional bounds into an inclusive range ending today by default.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidDateRange` when `start > end`.
    pub fn resolve_range(
        &self,
        start: Option<StudyDate>,
        end: Option<StudyDate>,
    ) -> Result<DateRange, StudyServiceError> {
        let end = end.unwrap_or_else(|| self.clock.today());
        let start = start.unwrap_or_else(|| end.add_days(1 - DEFAULT_STATS_WINDOW_DAYS));
        Ok(DateRange::new(start, end)?)
    }

    /// Days with activity in the range, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an inverted range, or the storage error.
    pub async fn daily_stats(
        &self,
        learner_id: LearnerId,
        start: Option<StudyDate>,
        end: Option<StudyDate>,
    ) -> Result<Vec<DailyStat>, StudyServiceError> {
        let range = self.resolve_range(start, end)?;
        Ok(self.stats.list_stats(learner_id, range).await?)
    }

    /// One cell per day in the range; days without activity have intensity 0.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an inverted range or one longer than
    /// `MAX_HEATMAP_DAYS`, or the storage error.
    pub async fn heatmap(
        &self,
        learner_id: LearnerId,
        start: Option<StudyDate>,
        end: Option<StudyDate>,
    ) -> Result<Vec<HeatmapCell>, StudyServiceError> {
        let range = self.resolve_range(start, end)?;
        let days = range.end().days_since(range.start());
        let span = u32::try_from(days + 1).unwrap_or(u32::MAX);
        if span > MAX_HEATMAP_DAYS {
            return Err(ValidationError::RangeTooLong {
                days: span,
                max: MAX_HEATMAP_DAYS,
            }
            .into());
        }

        let by_date: HashMap<StudyDate, DailyStat> = self
            .stats
            .list_stats(learner_id, range)
            .await?
            .into_iter()
            .map(|stat| (stat.date, stat))
            .collect();

        Ok((0..=days)
            .map(|offset| {
                let date = range.start().add_days(offset);
                let intensity = by_date
                    .get(&date)
                    .map_or(0, |stat| self.thresholds.intensity(stat));
                HeatmapCell { date, intensity }
            })
            .collect())
    }
}
