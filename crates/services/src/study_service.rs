use std::sync::Arc;

use futures::try_join;
use serde::{Serialize, Serializer};
use storage::repository::{
    BucketQuery, DateList, ProgressCounts, Storage, StorageError, VocabularyLookup,
    WordRecordRepository,
};
use vocab_core::model::{
    DailyLimit, DailyStat, HeatmapCell, LearnerId, ListLimit, SortSpec, StudyDate, StudySettings,
    WordId, WordRecord, WordWithMetadata,
};
use vocab_core::scheduler::{Bucket, ReviewAction, Scheduler, Transition};

use crate::Clock;
use crate::error::StudyServiceError;
use crate::stats_service::StatsService;
use crate::vocabulary_join::resolve_entries;

//
// ─── RESPONSES ─────────────────────────────────────────────────────────────────
//

/// Bucket sizes for a learner today. `new_count` is the remaining quota, not
/// the size of the unstarted pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyStats {
    pub new_count: u64,
    pub review_count: u64,
    pub overdue_count: u64,
}

/// Result of a successful action.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub record: WordRecord,
    pub transition: Transition,
    /// Set when the record was written but the daily counters were not.
    #[serde(serialize_with = "error_message")]
    pub stats_error: Option<StorageError>,
}

fn error_message<S: Serializer>(err: &Option<StorageError>, s: S) -> Result<S::Ok, S::Error> {
    match err {
        Some(err) => s.serialize_some(&err.to_string()),
        None => s.serialize_none(),
    }
}

/// Parameters of a word list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordListRequest {
    pub bucket: Bucket,
    pub limit: u32,
    /// Per-request override of the daily new-word quota, clamped to `1..=100`.
    pub daily_limit: Option<u32>,
    /// Ignored for the new bucket, which is always oldest first.
    pub sort: Option<SortSpec>,
    pub skip: u32,
}

impl WordListRequest {
    #[must_use]
    pub fn new(bucket: Bucket, limit: u32) -> Self {
        Self {
            bucket,
            limit,
            daily_limit: None,
            sort: None,
            skip: 0,
        }
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    #[must_use]
    pub fn with_daily_limit(mut self, daily_limit: u32) -> Self {
        self.daily_limit = Some(daily_limit);
        self
    }

    #[must_use]
    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Orchestrates buckets, quota, actions and stats for learners.
#[derive(Clone)]
pub struct StudyService {
    clock: Clock,
    scheduler: Scheduler,
    daily_limit: DailyLimit,
    records: Arc<dyn WordRecordRepository>,
    vocabulary: Arc<dyn VocabularyLookup>,
    stats: StatsService,
}

impl StudyService {
    /// Build the service over `storage`. The clock takes the settings' UTC offset.
    #[must_use]
    pub fn new(clock: Clock, settings: &StudySettings, storage: &Storage) -> Self {
        let clock = clock.with_offset(settings.utc_offset());
        Self {
            clock,
            scheduler: Scheduler::with_intervals(settings.intervals().clone()),
            daily_limit: settings.daily_limit(),
            records: Arc::clone(&storage.records),
            vocabulary: Arc::clone(&storage.vocabulary),
            stats: StatsService::new(clock, Arc::clone(&storage.daily_stats)),
        }
    }

    /// Override the clock, keeping its own offset.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self.stats = self.stats.with_clock(clock);
        self
    }

    #[must_use]
    pub fn today(&self) -> StudyDate {
        self.clock.today()
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn stats(&self) -> &StatsService {
        &self.stats
    }

    fn effective_limit(&self, daily_limit: Option<u32>) -> DailyLimit {
        daily_limit.map_or(self.daily_limit, DailyLimit::clamped)
    }

    /// How many new words the learner may still start today.
    ///
    /// Returns 0 without counting the unstarted pool once the quota is used up.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    pub async fn new_words_available_today(
        &self,
        learner_id: LearnerId,
        limit: DailyLimit,
    ) -> Result<u64, StorageError> {
        let today = self.today();
        let already = self.records.count_started_on(learner_id, today).await?;
        let remaining = u64::from(limit.get()).saturating_sub(already);
        if remaining == 0 {
            tracing::debug!(learner = %learner_id, %today, already, "daily new-word quota used up");
            return Ok(0);
        }
        let pool = self
            .records
            .count_bucket(learner_id, Bucket::New, today, self.scheduler.max_level())
            .await?;
        Ok(remaining.min(pool))
    }

    /// Bucket sizes for today.
    ///
    /// # Errors
    ///
    /// Returns `StudyServiceError::Storage` on backend failures.
    pub async fn get_stats(
        &self,
        learner_id: LearnerId,
        daily_limit: Option<u32>,
    ) -> Result<StudyStats, StudyServiceError> {
        let today = self.today();
        let max_level = self.scheduler.max_level();
        let (new_count, review_count, overdue_count) = try_join!(
            self.new_words_available_today(learner_id, self.effective_limit(daily_limit)),
            self.records
                .count_bucket(learner_id, Bucket::Review, today, max_level),
            self.records
                .count_bucket(learner_id, Bucket::Overdue, today, max_level),
        )?;
        Ok(StudyStats {
            new_count,
            review_count,
            overdue_count,
        })
    }

    /// One page of a bucket, joined with catalog metadata.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidLimit` before touching storage when
    /// `limit` is outside `1..=100`, or the storage error.
    pub async fn get_word_list(
        &self,
        learner_id: LearnerId,
        request: WordListRequest,
    ) -> Result<Vec<WordWithMetadata>, StudyServiceError> {
        let limit = ListLimit::new(request.limit)?.get();
        let today = self.today();

        let (limit, sort) = match request.bucket {
            Bucket::New => {
                let available = self
                    .new_words_available_today(learner_id, self.effective_limit(request.daily_limit))
                    .await?;
                let open = available.saturating_sub(u64::from(request.skip));
                if open == 0 {
                    return Ok(Vec::new());
                }
                let capped = u32::try_from(open).map_or(limit, |open| open.min(limit));
                (capped, SortSpec::oldest_first())
            }
            Bucket::Review | Bucket::Overdue => (limit, request.sort.unwrap_or_default()),
        };

        let query = BucketQuery {
            bucket: request.bucket,
            today,
            max_level: self.scheduler.max_level(),
            sort,
            limit,
            skip: request.skip,
        };
        let records = self.records.query_bucket(learner_id, &query).await?;
        Ok(resolve_entries(self.vocabulary.as_ref(), records).await?)
    }

    /// Apply `action` to the learner's word, persist it, then count it.
    ///
    /// `daily_limit` overrides the configured quota for a start, the same way
    /// it does for `get_stats` and `get_word_list`.
    ///
    /// The record write comes first; the stats update is best-effort and its
    /// failure is reported in `ActionOutcome::stats_error`. The writes are not
    /// transactional: if the date append fails after the record was stored, the
    /// new level stays and a retry fails the scheduler check.
    ///
    /// # Errors
    ///
    /// - `Storage(NotFound)` if the learner has no record for the word.
    /// - `Scheduler(..)` if the word is in the wrong bucket for `action`.
    /// - `QuotaExhausted` when starting a word after today's quota is used.
    pub async fn apply_action(
        &self,
        learner_id: LearnerId,
        word_id: WordId,
        action: ReviewAction,
        daily_limit: Option<u32>,
    ) -> Result<ActionOutcome, StudyServiceError> {
        let today = self.today();
        let mut record = self
            .records
            .get_record(learner_id, word_id)
            .await?
            .ok_or(StorageError::NotFound)?;

        let transition = self.scheduler.apply(action, &record, today)?;

        if action == ReviewAction::Start {
            let limit = self.effective_limit(daily_limit);
            if self.new_words_available_today(learner_id, limit).await? == 0 {
                return Err(StudyServiceError::QuotaExhausted {
                    learner_id,
                    limit: limit.get(),
                });
            }
        }

        record.apply_transition(&transition, self.clock.now());
        self.records.upsert_record(&record).await?;
        let list = DateList::for_activity(transition.activity);
        if let Err(err) = self
            .records
            .append_date(learner_id, word_id, list, transition.date)
            .await
        {
            tracing::warn!(
                learner = %learner_id,
                word = %word_id,
                action = action.as_str(),
                level = %transition.level,
                error = %err,
                "record updated but activity date not appended"
            );
            return Err(err.into());
        }

        tracing::debug!(
            learner = %learner_id,
            word = %word_id,
            action = action.as_str(),
            level = %transition.level,
            next_review = %transition.next_review_date,
            "action applied"
        );

        let stats_error = self
            .stats
            .record_action_best_effort(learner_id, transition.date, transition.activity)
            .await;

        Ok(ActionOutcome {
            record,
            transition,
            stats_error,
        })
    }

    /// Daily counters in the range, defaulting to the last 365 days.
    ///
    /// # Errors
    ///
    /// Returns a validation error for `start > end`, or the storage error.
    pub async fn get_daily_stats(
        &self,
        learner_id: LearnerId,
        start: Option<StudyDate>,
        end: Option<StudyDate>,
    ) -> Result<Vec<DailyStat>, StudyServiceError> {
        self.stats.daily_stats(learner_id, start, end).await
    }

    /// Heatmap cells for the range, defaulting to the last 365 days.
    ///
    /// # Errors
    ///
    /// Returns a validation error for `start > end`, or the storage error.
    pub async fn heatmap(
        &self,
        learner_id: LearnerId,
        start: Option<StudyDate>,
        end: Option<StudyDate>,
    ) -> Result<Vec<HeatmapCell>, StudyServiceError> {
        self.stats.heatmap(learner_id, start, end).await
    }

    /// Put a word on the learner's list. Existing records are returned untouched.
    ///
    /// # Errors
    ///
    /// Returns `StudyServiceError::Storage` on backend failures.
    pub async fn add_word(
        &self,
        learner_id: LearnerId,
        word_id: WordId,
    ) -> Result<WordRecord, StudyServiceError> {
        if let Some(existing) = self.records.get_record(learner_id, word_id).await? {
            return Ok(existing);
        }
        let record = WordRecord::new_unstarted(learner_id, word_id, self.clock.now());
        self.records.upsert_record(&record).await?;
        Ok(record)
    }

    /// Drop a word from the learner's list. Returns whether it was there.
    ///
    /// # Errors
    ///
    /// Returns `StudyServiceError::Storage` on backend failures.
    pub async fn remove_word(
        &self,
        learner_id: LearnerId,
        word_id: WordId,
    ) -> Result<bool, StudyServiceError> {
        Ok(self.records.delete_record(learner_id, word_id).await?)
    }

    /// # Errors
    ///
    /// Returns `StudyServiceError::Storage` on backend failures.
    pub async fn progress_overview(
        &self,
        learner_id: LearnerId,
    ) -> Result<ProgressCounts, StudyServiceError> {
        Ok(self
            .records
            .count_progress(learner_id, self.scheduler.max_level())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;
    use vocab_core::model::{Level, StudySettingsDraft, VocabularyEntry};
    use vocab_core::scheduler::SchedulerError;
    use vocab_core::time::fixed_now;

    fn build(daily_limit: u32) -> (StudyService, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        let settings = StudySettingsDraft {
            daily_new_limit: Some(daily_limit),
            ..StudySettingsDraft::default()
        }
        .validate()
        .unwrap();
        let service = StudyService::new(
            Clock::fixed(fixed_now()),
            &settings,
            &Storage::from_in_memory(repo.clone()),
        );
        (service, repo)
    }

    #[tokio::test]
    async fn start_moves_word_to_level_one_and_counts_it() {
        let (service, _) = build(20);
        let learner = LearnerId::new(1);
        service.add_word(learner, WordId::new(1)).await.unwrap();

        let outcome = service
            .apply_action(learner, WordId::new(1), ReviewAction::Start, None)
            .await
            .unwrap();
        let today = service.today();

        assert_eq!(outcome.record.level(), Some(Level::new(1)));
        assert_eq!(outcome.record.next_review_date(), Some(today.add_days(2)));
        assert_eq!(outcome.record.actual_learn_dates(), &[today]);
        assert!(outcome.stats_error.is_none());

        let stats = service.get_daily_stats(learner, None, None).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].learned_count, 1);
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let (service, _) = build(20);
        let err = service
            .apply_action(LearnerId::new(1), WordId::new(9), ReviewAction::Start, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StudyServiceError::Storage(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn review_before_due_is_rejected() {
        let (service, _) = build(20);
        let learner = LearnerId::new(1);
        service.add_word(learner, WordId::new(1)).await.unwrap();
        service
            .apply_action(learner, WordId::new(1), ReviewAction::Start, None)
            .await
            .unwrap();

        let err = service
            .apply_action(learner, WordId::new(1), ReviewAction::Review, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StudyServiceError::Scheduler(SchedulerError::NotDue { .. })
        ));
    }

    #[tokio::test]
    async fn quota_blocks_extra_starts() {
        let (service, _) = build(2);
        let learner = LearnerId::new(1);
        for id in 1..=3 {
            service.add_word(learner, WordId::new(id)).await.unwrap();
        }
        for id in 1..=2 {
            service
                .apply_action(learner, WordId::new(id), ReviewAction::Start, None)
                .await
                .unwrap();
        }

        let err = service
            .apply_action(learner, WordId::new(3), ReviewAction::Start, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StudyServiceError::QuotaExhausted { limit: 2, .. }
        ));

        let stats = service.get_stats(learner, None).await.unwrap();
        assert_eq!(stats.new_count, 0);
        let listed = service
            .get_word_list(learner, WordListRequest::new(Bucket::New, 10))
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn start_honours_the_same_override_as_the_new_list() {
        let (service, _) = build(1);
        let learner = LearnerId::new(1);
        for id in 1..=3 {
            service.add_word(learner, WordId::new(id)).await.unwrap();
        }
        service
            .apply_action(learner, WordId::new(1), ReviewAction::Start, None)
            .await
            .unwrap();

        let stats = service.get_stats(learner, Some(5)).await.unwrap();
        assert_eq!(stats.new_count, 2);
        let listed = service
            .get_word_list(
                learner,
                WordListRequest::new(Bucket::New, 10).with_daily_limit(5),
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);

        let first = listed[0].record.word_id();
        let started = service
            .apply_action(learner, first, ReviewAction::Start, Some(5))
            .await
            .unwrap();
        assert!(started.record.is_started());

        // without the override the configured quota of one still applies
        let second = listed[1].record.word_id();
        let err = service
            .apply_action(learner, second, ReviewAction::Start, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StudyServiceError::QuotaExhausted { limit: 1, .. }
        ));
    }

    #[tokio::test]
    async fn new_list_is_capped_by_quota_and_oldest_first() {
        let (service, repo) = build(3);
        let learner = LearnerId::new(1);
        for id in (1..=5).rev() {
            service
                .clone()
                .with_clock(Clock::fixed(fixed_now() + chrono::Duration::seconds(10 - id)))
                .add_word(learner, WordId::new(u64::try_from(id).unwrap()))
                .await
                .unwrap();
        }
        repo.insert_entry(VocabularyEntry::new(WordId::new(5), "eloquent"))
            .unwrap();

        let listed = service
            .get_word_list(
                learner,
                WordListRequest::new(Bucket::New, 10).with_sort(SortSpec::default()),
            )
            .await
            .unwrap();
        let ids: Vec<u64> = listed.iter().map(|w| w.record.word_id().value()).collect();
        // word 5 was added first
        assert_eq!(ids, vec![5, 4, 3]);
        assert_eq!(
            listed[0].entry.as_ref().map(|e| e.spelling.as_str()),
            Some("eloquent")
        );
        assert!(listed[1].entry.is_none());

        let overridden = service
            .get_word_list(
                learner,
                WordListRequest::new(Bucket::New, 10).with_daily_limit(0),
            )
            .await
            .unwrap();
        assert_eq!(overridden.len(), 1);
    }

    #[tokio::test]
    async fn invalid_limit_is_a_validation_error() {
        let (service, _) = build(20);
        for limit in [0, 101] {
            let err = service
                .get_word_list(LearnerId::new(1), WordListRequest::new(Bucket::Review, limit))
                .await
                .unwrap_err();
            assert!(matches!(err, StudyServiceError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn add_word_is_idempotent_and_remove_reports() {
        let (service, _) = build(20);
        let learner = LearnerId::new(1);
        let first = service.add_word(learner, WordId::new(1)).await.unwrap();
        service
            .apply_action(learner, WordId::new(1), ReviewAction::Start, None)
            .await
            .unwrap();

        let again = service.add_word(learner, WordId::new(1)).await.unwrap();
        assert_eq!(again.created_at(), first.created_at());
        assert!(again.is_started());

        let overview = service.progress_overview(learner).await.unwrap();
        assert_eq!((overview.total, overview.started), (1, 1));

        assert!(service.remove_word(learner, WordId::new(1)).await.unwrap());
        assert!(!service.remove_word(learner, WordId::new(1)).await.unwrap());
    }
}
