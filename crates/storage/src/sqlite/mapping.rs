use serde::{Serialize, de::DeserializeOwned};
use sqlx::Row;
use vocab_core::model::{
    DailyStat, LearnerId, Pronunciation, StudyDate, Translation, VocabularyEntry, WordId,
};

use crate::repository::{StorageError, WordRecordRow};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn learner_id_from_i64(v: i64) -> Result<LearnerId, StorageError> {
    Ok(LearnerId::new(i64_to_u64("learner_id", v)?))
}

pub(crate) fn word_id_from_i64(v: i64) -> Result<WordId, StorageError> {
    Ok(WordId::new(i64_to_u64("word_id", v)?))
}

pub(crate) fn count_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

fn opt_date(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Option<StudyDate>, StorageError> {
    row.try_get::<Option<String>, _>(column)
        .map_err(ser)?
        .map(|raw| raw.parse::<StudyDate>().map_err(ser))
        .transpose()
}

pub(crate) fn map_word_record_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<WordRecordRow, StorageError> {
    let learn_dates: String = row.try_get("actual_learn_dates").map_err(ser)?;
    let review_dates: String = row.try_get("actual_review_dates").map_err(ser)?;

    Ok(WordRecordRow {
        learner_id: learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        word_id: word_id_from_i64(row.try_get::<i64, _>("word_id").map_err(ser)?)?,
        level: row.try_get("level").map_err(ser)?,
        first_learn_date: opt_date(row, "first_learn_date")?,
        next_review_date: opt_date(row, "next_review_date")?,
        actual_learn_dates: from_json(&learn_dates)?,
        actual_review_dates: from_json(&review_dates)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_daily_stat_row(row: &sqlx::sqlite::SqliteRow) -> Result<DailyStat, StorageError> {
    let date: String = row.try_get("date").map_err(ser)?;
    Ok(DailyStat {
        learner_id: learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        date: date.parse().map_err(ser)?,
        learned_count: count_from_i64(
            "learned_count",
            row.try_get::<i64, _>("learned_count").map_err(ser)?,
        )?,
        reviewed_count: count_from_i64(
            "reviewed_count",
            row.try_get::<i64, _>("reviewed_count").map_err(ser)?,
        )?,
    })
}

pub(crate) fn map_vocabulary_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<VocabularyEntry, StorageError> {
    let pronunciations: String = row.try_get("pronunciations").map_err(ser)?;
    let translations: String = row.try_get("translations").map_err(ser)?;

    Ok(VocabularyEntry {
        word_id: word_id_from_i64(row.try_get::<i64, _>("word_id").map_err(ser)?)?,
        spelling: row.try_get("spelling").map_err(ser)?,
        pronunciations: from_json::<Vec<Pronunciation>>(&pronunciations)?,
        translations: from_json::<Vec<Translation>>(&translations)?,
    })
}
