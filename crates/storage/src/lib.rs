#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    BucketQuery, DailyStatRepository, DateList, InMemoryRepository, MAX_LOOKUP_BATCH,
    ProgressCounts, Storage, StorageError, VocabularyLookup, WordRecordRepository,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
