use vocab_core::model::{VocabularyEntry, WordId};

use super::{
    SqliteRepository,
    mapping::{conn, id_to_i64, map_vocabulary_row, to_json},
};
use crate::repository::{StorageError, VocabularyLookup};

impl SqliteRepository {
    /// Insert or replace a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be encoded or written.
    pub async fn upsert_vocabulary_entry(&self, entry: &VocabularyEntry) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO vocabulary (word_id, spelling, pronunciations, translations)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(word_id) DO UPDATE SET
                spelling = excluded.spelling,
                pronunciations = excluded.pronunciations,
                translations = excluded.translations
            ",
        )
        .bind(id_to_i64("word_id", entry.word_id.value())?)
        .bind(entry.spelling.clone())
        .bind(to_json(&entry.pronunciations)?)
        .bind(to_json(&entry.translations)?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl VocabularyLookup for SqliteRepository {
    async fn entries_by_ids(&self, ids: &[WordId]) -> Result<Vec<VocabularyEntry>, StorageError> {
        if ids.len() > self.max_batch() {
            return Err(StorageError::BatchTooLarge {
                requested: ids.len(),
                max: self.max_batch(),
            });
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
            SELECT word_id, spelling, pronunciations, translations
            FROM vocabulary
            WHERE word_id IN (
            ",
        );
        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push(')');

        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(id_to_i64("word_id", id.value())?);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(conn)?;
        rows.iter().map(map_vocabulary_row).collect()
    }
}
