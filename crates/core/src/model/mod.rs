mod daily_stat;
mod date;
mod ids;
mod listing;
mod settings;
mod vocabulary;
mod word_record;

pub use ids::{LearnerId, ParseIdError, WordId};

pub use daily_stat::{ActivityKind, DailyStat, HeatmapCell, HeatmapThresholds, MAX_INTENSITY};
pub use date::StudyDate;
pub use listing::{DateRange, ListLimit, MAX_LIST_LIMIT, SortField, SortOrder, SortSpec};
pub use settings::{
    DEFAULT_DAILY_NEW_WORDS, DailyLimit, MAX_DAILY_NEW_WORDS, MIN_DAILY_NEW_WORDS, SettingsError,
    StudySettings, StudySettingsDraft,
};
pub use vocabulary::{Pronunciation, Translation, VocabularyEntry, WordWithMetadata};
pub use word_record::{Level, Progress, WordRecord, WordRecordError};
