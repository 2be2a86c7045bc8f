use vocab_core::model::{LearnerId, Level, StudyDate, WordId, WordRecord};
use vocab_core::scheduler::Bucket;

use super::{
    SqliteRepository,
    mapping::{conn, id_to_i64, map_word_record_row, ser, to_json},
};
use crate::repository::{
    BucketQuery, DateList, ProgressCounts, StorageError, WordRecordRepository, WordRecordRow,
};

const RECORD_COLUMNS: &str = r"
    id, learner_id, word_id, level, first_learn_date, next_review_date,
    actual_learn_dates, actual_review_dates, created_at, updated_at
";

/// SQL predicate selecting one bucket. Binds are `max_level` then `today`
/// for the review buckets and nothing for `New`.
fn bucket_predicate(bucket: Bucket) -> &'static str {
    match bucket {
        Bucket::New => "level IS NULL",
        Bucket::Review => "level IS NOT NULL AND level < ? AND next_review_date = ?",
        Bucket::Overdue => "level IS NOT NULL AND level < ? AND next_review_date < ?",
    }
}

fn append_sql(list: DateList) -> &'static str {
    match list {
        DateList::Learn => {
            "UPDATE word_records SET actual_learn_dates = json_insert(actual_learn_dates, '$[#]', ?1) WHERE id = ?2"
        }
        DateList::Review => {
            "UPDATE word_records SET actual_review_dates = json_insert(actual_review_dates, '$[#]', ?1) WHERE id = ?2"
        }
    }
}

fn learner_i64(learner_id: LearnerId) -> Result<i64, StorageError> {
    id_to_i64("learner_id", learner_id.value())
}

#[async_trait::async_trait]
impl WordRecordRepository for SqliteRepository {
    async fn get_record(
        &self,
        learner_id: LearnerId,
        word_id: WordId,
    ) -> Result<Option<WordRecord>, StorageError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM word_records WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(WordRecord::make_store_key(learner_id, word_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.map(|r| map_word_record_row(&r).and_then(WordRecordRow::into_record))
            .transpose()
    }

    async fn upsert_record(&self, record: &WordRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO word_records (
                id, learner_id, word_id, level, first_learn_date, next_review_date,
                actual_learn_dates, actual_review_dates, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                -- audit lists only grow through append_date
                level = excluded.level,
                first_learn_date = excluded.first_learn_date,
                next_review_date = excluded.next_review_date,
                updated_at = excluded.updated_at
            ",
        )
        .bind(record.store_key())
        .bind(learner_i64(record.learner_id())?)
        .bind(id_to_i64("word_id", record.word_id().value())?)
        .bind(record.level().map(|l| i64::from(l.value())))
        .bind(record.first_learn_date().map(|d| d.to_string()))
        .bind(record.next_review_date().map(|d| d.to_string()))
        .bind(to_json(&record.actual_learn_dates())?)
        .bind(to_json(&record.actual_review_dates())?)
        .bind(record.created_at())
        .bind(record.updated_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn append_date(
        &self,
        learner_id: LearnerId,
        word_id: WordId,
        list: DateList,
        date: StudyDate,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(append_sql(list))
            .bind(date.to_string())
            .bind(WordRecord::make_store_key(learner_id, word_id))
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn query_bucket(
        &self,
        learner_id: LearnerId,
        query: &BucketQuery,
    ) -> Result<Vec<WordRecord>, StorageError> {
        let order = query.sort.order.as_sql();
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM word_records \
             WHERE learner_id = ? AND {predicate} \
             ORDER BY {column} {order}, word_id {order} \
             LIMIT ? OFFSET ?",
            predicate = bucket_predicate(query.bucket),
            column = query.sort.field.column(),
        );

        let mut q = sqlx::query(&sql).bind(learner_i64(learner_id)?);
        if query.bucket != Bucket::New {
            q = q
                .bind(i64::from(query.max_level.value()))
                .bind(query.today.to_string());
        }
        let rows = q
            .bind(i64::from(query.limit))
            .bind(i64::from(query.skip))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter()
            .map(|row| map_word_record_row(row).and_then(WordRecordRow::into_record))
            .collect()
    }

    async fn count_bucket(
        &self,
        learner_id: LearnerId,
        bucket: Bucket,
        today: StudyDate,
        max_level: Level,
    ) -> Result<u64, StorageError> {
        let sql = format!(
            "SELECT COUNT(*) FROM word_records WHERE learner_id = ? AND {}",
            bucket_predicate(bucket)
        );

        let mut q = sqlx::query_scalar::<_, i64>(&sql).bind(learner_i64(learner_id)?);
        if bucket != Bucket::New {
            q = q.bind(i64::from(max_level.value())).bind(today.to_string());
        }
        let count = q.fetch_one(&self.pool).await.map_err(conn)?;
        u64::try_from(count).map_err(ser)
    }

    async fn count_started_on(
        &self,
        learner_id: LearnerId,
        date: StudyDate,
    ) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM word_records WHERE learner_id = ?1 AND first_learn_date = ?2",
        )
        .bind(learner_i64(learner_id)?)
        .bind(date.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;
        u64::try_from(count).map_err(ser)
    }

    async fn count_progress(
        &self,
        learner_id: LearnerId,
        max_level: Level,
    ) -> Result<ProgressCounts, StorageError> {
        let (total, started, mastered): (i64, i64, i64) = sqlx::query_as(
            r"
            SELECT
                COUNT(*),
                COUNT(level),
                COALESCE(SUM(CASE WHEN level >= ?2 THEN 1 ELSE 0 END), 0)
            FROM word_records
            WHERE learner_id = ?1
            ",
        )
        .bind(learner_i64(learner_id)?)
        .bind(i64::from(max_level.value()))
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        Ok(ProgressCounts {
            total: u64::try_from(total).map_err(ser)?,
            started: u64::try_from(started).map_err(ser)?,
            mastered: u64::try_from(mastered).map_err(ser)?,
        })
    }

    async fn delete_record(
        &self,
        learner_id: LearnerId,
        word_id: WordId,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM word_records WHERE id = ?1")
            .bind(WordRecord::make_store_key(learner_id, word_id))
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(result.rows_affected() > 0)
    }
}
