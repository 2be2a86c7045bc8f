use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use vocab_core::model::{
    ActivityKind, DailyStat, DateRange, LearnerId, Level, SortField, SortOrder, SortSpec, StudyDate,
    VocabularyEntry, WordId, WordRecord,
};
use vocab_core::scheduler::{Bucket, bucket_of};

/// Largest id set a single vocabulary lookup accepts.
pub const MAX_LOOKUP_BATCH: usize = 20;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("lookup batch of {requested} ids exceeds the maximum of {max}")]
    BatchTooLarge { requested: usize, max: usize },
}

//
// ─── WORD RECORDS ──────────────────────────────────────────────────────────────
//

/// Audit-trail list a date is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateList {
    Learn,
    Review,
}

impl DateList {
    #[must_use]
    pub fn for_activity(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Learn => DateList::Learn,
            ActivityKind::Review => DateList::Review,
        }
    }
}

/// Page request over one bucket of a learner's words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketQuery {
    pub bucket: Bucket,
    pub today: StudyDate,
    pub max_level: Level,
    pub sort: SortSpec,
    pub limit: u32,
    pub skip: u32,
}

impl BucketQuery {
    #[must_use]
    pub fn matches(&self, record: &WordRecord) -> bool {
        bucket_of(record, self.today, self.max_level) == Some(self.bucket)
    }
}

/// Overview counts for a learner's collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressCounts {
    pub total: u64,
    pub started: u64,
    pub mastered: u64,
}

/// Persisted shape of a word record.
///
/// Mirrors the stored columns so adapters can hold raw values and run the
/// domain validation only when handing a `WordRecord` back out.
#[derive(Debug, Clone)]
pub struct WordRecordRow {
    pub learner_id: LearnerId,
    pub word_id: WordId,
    pub level: Option<i64>,
    pub first_learn_date: Option<StudyDate>,
    pub next_review_date: Option<StudyDate>,
    pub actual_learn_dates: Vec<StudyDate>,
    pub actual_review_dates: Vec<StudyDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WordRecordRow {
    #[must_use]
    pub fn from_record(record: &WordRecord) -> Self {
        Self {
            learner_id: record.learner_id(),
            word_id: record.word_id(),
            level: record.level().map(|l| i64::from(l.value())),
            first_learn_date: record.first_learn_date(),
            next_review_date: record.next_review_date(),
            actual_learn_dates: record.actual_learn_dates().to_vec(),
            actual_review_dates: record.actual_review_dates().to_vec(),
            created_at: record.created_at(),
            updated_at: record.updated_at(),
        }
    }

    /// Convert the row back into a domain `WordRecord`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored progress is inconsistent.
    pub fn into_record(self) -> Result<WordRecord, StorageError> {
        WordRecord::from_persisted(
            self.learner_id,
            self.word_id,
            self.level,
            self.first_learn_date,
            self.next_review_date,
            self.actual_learn_dates,
            self.actual_review_dates,
            self.created_at,
            self.updated_at,
            u8::MAX,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn overwrite_scalars(&mut self, from: WordRecordRow) {
        self.level = from.level;
        self.first_learn_date = from.first_learn_date;
        self.next_review_date = from.next_review_date;
        self.updated_at = from.updated_at;
    }
}

/// Repository contract for per-(learner, word) study state.
#[async_trait]
pub trait WordRecordRepository: Send + Sync {
    /// Fetch one record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_record(
        &self,
        learner_id: LearnerId,
        word_id: WordId,
    ) -> Result<Option<WordRecord>, StorageError>;

    /// Create or update a record. Last writer wins.
    ///
    /// On insert the audit lists are stored as given; on update only the
    /// scalar fields change and the lists are left to `append_date`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_record(&self, record: &WordRecord) -> Result<(), StorageError>;

    /// Atomically append `date` to one of the record's audit lists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn append_date(
        &self,
        learner_id: LearnerId,
        word_id: WordId,
        list: DateList,
        date: StudyDate,
    ) -> Result<(), StorageError>;

    /// Page over a learner's records in one bucket.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn query_bucket(
        &self,
        learner_id: LearnerId,
        query: &BucketQuery,
    ) -> Result<Vec<WordRecord>, StorageError>;

    /// Number of a learner's records in `bucket`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_bucket(
        &self,
        learner_id: LearnerId,
        bucket: Bucket,
        today: StudyDate,
        max_level: Level,
    ) -> Result<u64, StorageError>;

    /// Number of words the learner first started on `date`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_started_on(
        &self,
        learner_id: LearnerId,
        date: StudyDate,
    ) -> Result<u64, StorageError>;

    /// Total, started and mastered counts for a learner.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_progress(
        &self,
        learner_id: LearnerId,
        max_level: Level,
    ) -> Result<ProgressCounts, StorageError>;

    /// Remove a record. Returns whether anything was deleted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn delete_record(&self, learner_id: LearnerId, word_id: WordId)
    -> Result<bool, StorageError>;
}

//
// ─── DAILY STATS ───────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait DailyStatRepository: Send + Sync {
    /// Read-or-create the day's counters and add one to `kind`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the counters cannot be written.
    async fn increment(
        &self,
        learner_id: LearnerId,
        date: StudyDate,
        kind: ActivityKind,
    ) -> Result<DailyStat, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_stat(
        &self,
        learner_id: LearnerId,
        date: StudyDate,
    ) -> Result<Option<DailyStat>, StorageError>;

    /// Days with recorded activity inside `range`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_stats(
        &self,
        learner_id: LearnerId,
        range: DateRange,
    ) -> Result<Vec<DailyStat>, StorageError>;
}

//
// ─── VOCABULARY ────────────────────────────────────────────────────────────────
//

/// Read-only access to the word catalog.
#[async_trait]
pub trait VocabularyLookup: Send + Sync {
    /// Most ids a single `entries_by_ids` call accepts.
    fn max_batch(&self) -> usize {
        MAX_LOOKUP_BATCH
    }

    /// Fetch catalog entries for `ids`.
    ///
    /// Missing ids are skipped and the output order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BatchTooLarge` when `ids` exceeds `max_batch()`.
    async fn entries_by_ids(&self, ids: &[WordId]) -> Result<Vec<VocabularyEntry>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<HashMap<String, WordRecordRow>>>,
    stats: Arc<Mutex<HashMap<(LearnerId, StudyDate), DailyStat>>>,
    vocabulary: Arc<Mutex<HashMap<WordId, VocabularyEntry>>>,
}

fn lock_err<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_entry(&self, entry: VocabularyEntry) -> Result<(), StorageError> {
        let mut guard = self.vocabulary.lock().map_err(lock_err)?;
        guard.insert(entry.word_id, entry);
        Ok(())
    }

    fn learner_records(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<WordRecord>, StorageError> {
        let guard = self.records.lock().map_err(lock_err)?;
        guard
            .values()
            .filter(|row| row.learner_id == learner_id)
            .cloned()
            .map(WordRecordRow::into_record)
            .collect()
    }
}

#[async_trait]
impl WordRecordRepository for InMemoryRepository {
    async fn get_record(
        &self,
        learner_id: LearnerId,
        word_id: WordId,
    ) -> Result<Option<WordRecord>, StorageError> {
        let guard = self.records.lock().map_err(lock_err)?;
        guard
            .get(&WordRecord::make_store_key(learner_id, word_id))
            .cloned()
            .map(WordRecordRow::into_record)
            .transpose()
    }

    async fn upsert_record(&self, record: &WordRecord) -> Result<(), StorageError> {
        let mut guard = self.records.lock().map_err(lock_err)?;
        let row = WordRecordRow::from_record(record);
        match guard.get_mut(&record.store_key()) {
            Some(existing) => existing.overwrite_scalars(row),
            None => {
                guard.insert(record.store_key(), row);
            }
        }
        Ok(())
    }

    async fn append_date(
        &self,
        learner_id: LearnerId,
        word_id: WordId,
        list: DateList,
        date: StudyDate,
    ) -> Result<(), StorageError> {
        let mut guard = self.records.lock().map_err(lock_err)?;
        let row = guard
            .get_mut(&WordRecord::make_store_key(learner_id, word_id))
            .ok_or(StorageError::NotFound)?;
        match list {
            DateList::Learn => row.actual_learn_dates.push(date),
            DateList::Review => row.actual_review_dates.push(date),
        }
        Ok(())
    }

    async fn query_bucket(
        &self,
        learner_id: LearnerId,
        query: &BucketQuery,
    ) -> Result<Vec<WordRecord>, StorageError> {
        let mut matching: Vec<WordRecord> = self
            .learner_records(learner_id)?
            .into_iter()
            .filter(|r| query.matches(r))
            .collect();

        matching.sort_by(|a, b| {
            let (ka, kb) = match query.sort.field {
                SortField::CreatedAt => (a.created_at(), b.created_at()),
                SortField::UpdatedAt => (a.updated_at(), b.updated_at()),
            };
            let ord = ka.cmp(&kb).then_with(|| a.word_id().cmp(&b.word_id()));
            match query.sort.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        Ok(matching
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn count_bucket(
        &self,
        learner_id: LearnerId,
        bucket: Bucket,
        today: StudyDate,
        max_level: Level,
    ) -> Result<u64, StorageError> {
        let count = self
            .learner_records(learner_id)?
            .iter()
            .filter(|r| bucket_of(r, today, max_level) == Some(bucket))
            .count();
        Ok(count as u64)
    }

    async fn count_started_on(
        &self,
        learner_id: LearnerId,
        date: StudyDate,
    ) -> Result<u64, StorageError> {
        let count = self
            .learner_records(learner_id)?
            .iter()
            .filter(|r| r.first_learn_date() == Some(date))
            .count();
        Ok(count as u64)
    }

    async fn count_progress(
        &self,
        learner_id: LearnerId,
        max_level: Level,
    ) -> Result<ProgressCounts, StorageError> {
        let records = self.learner_records(learner_id)?;
        let mut counts = ProgressCounts {
            total: records.len() as u64,
            ..ProgressCounts::default()
        };
        for level in records.iter().filter_map(WordRecord::level) {
            counts.started += 1;
            if level >= max_level {
                counts.mastered += 1;
            }
        }
        Ok(counts)
    }

    async fn delete_record(
        &self,
        learner_id: LearnerId,
        word_id: WordId,
    ) -> Result<bool, StorageError> {
        let mut guard = self.records.lock().map_err(lock_err)?;
        Ok(guard
            .remove(&WordRecord::make_store_key(learner_id, word_id))
            .is_some())
    }
}

#[async_trait]
impl DailyStatRepository for InMemoryRepository {
    async fn increment(
        &self,
        learner_id: LearnerId,
        date: StudyDate,
        kind: ActivityKind,
    ) -> Result<DailyStat, StorageError> {
        let mut guard = self.stats.lock().map_err(lock_err)?;
        let stat = guard
            .entry((learner_id, date))
            .or_insert_with(|| DailyStat::empty(learner_id, date));
        stat.record(kind);
        Ok(stat.clone())
    }

    async fn get_stat(
        &self,
        learner_id: LearnerId,
        date: StudyDate,
    ) -> Result<Option<DailyStat>, StorageError> {
        let guard = self.stats.lock().map_err(lock_err)?;
        Ok(guard.get(&(learner_id, date)).cloned())
    }

    async fn list_stats(
        &self,
        learner_id: LearnerId,
        range: DateRange,
    ) -> Result<Vec<DailyStat>, StorageError> {
        let guard = self.stats.lock().map_err(lock_err)?;
        let mut out: Vec<DailyStat> = guard
            .values()
            .filter(|s| s.learner_id == learner_id && range.contains(s.date))
            .cloned()
            .collect();
        out.sort_by_key(|s| s.date);
        Ok(out)
    }
}

#[async_trait]
impl VocabularyLookup for InMemoryRepository {
    async fn entries_by_ids(&self, ids: &[WordId]) -> Result<Vec<VocabularyEntry>, StorageError> {
        if ids.len() > self.max_batch() {
            return Err(StorageError::BatchTooLarge {
                requested: ids.len(),
                max: self.max_batch(),
            });
        }
        let guard = self.vocabulary.lock().map_err(lock_err)?;
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub records: Arc<dyn WordRecordRepository>,
    pub daily_stats: Arc<dyn DailyStatRepository>,
    pub vocabulary: Arc<dyn VocabularyLookup>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    /// Wrap an existing in-memory repository (handy when tests need to seed it).
    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let records: Arc<dyn WordRecordRepository> = Arc::new(repo.clone());
        let daily_stats: Arc<dyn DailyStatRepository> = Arc::new(repo.clone());
        let vocabulary: Arc<dyn VocabularyLookup> = Arc::new(repo);
        Self {
            records,
            daily_stats,
            vocabulary,
        }
    }
}
