use vocab_core::model::{ActivityKind, DailyStat, DateRange, LearnerId, StudyDate};

use super::{
    SqliteRepository,
    mapping::{conn, id_to_i64, map_daily_stat_row},
};
use crate::repository::{DailyStatRepository, StorageError};

#[async_trait::async_trait]
impl DailyStatRepository for SqliteRepository {
    async fn increment(
        &self,
        learner_id: LearnerId,
        date: StudyDate,
        kind: ActivityKind,
    ) -> Result<DailyStat, StorageError> {
        let (learned, reviewed): (i64, i64) = match kind {
            ActivityKind::Learn => (1, 0),
            ActivityKind::Review => (0, 1),
        };

        let row = sqlx::query(
            r"
            INSERT INTO daily_stats (learner_id, date, learned_count, reviewed_count)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(learner_id, date) DO UPDATE SET
                learned_count = learned_count + excluded.learned_count,
                reviewed_count = reviewed_count + excluded.reviewed_count
            RETURNING learner_id, date, learned_count, reviewed_count
            ",
        )
        .bind(id_to_i64("learner_id", learner_id.value())?)
        .bind(date.to_string())
        .bind(learned)
        .bind(reviewed)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        map_daily_stat_row(&row)
    }

    async fn get_stat(
        &self,
        learner_id: LearnerId,
        date: StudyDate,
    ) -> Result<Option<DailyStat>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT learner_id, date, learned_count, reviewed_count
            FROM daily_stats
            WHERE learner_id = ?1 AND date = ?2
            ",
        )
        .bind(id_to_i64("learner_id", learner_id.value())?)
        .bind(date.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.map(|r| map_daily_stat_row(&r)).transpose()
    }

    async fn list_stats(
        &self,
        learner_id: LearnerId,
        range: DateRange,
    ) -> Result<Vec<DailyStat>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT learner_id, date, learned_count, reviewed_count
            FROM daily_stats
            WHERE learner_id = ?1 AND date >= ?2 AND date <= ?3
            ORDER BY date ASC
            ",
        )
        .bind(id_to_i64("learner_id", learner_id.value())?)
        .bind(range.start().to_string())
        .bind(range.end().to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_daily_stat_row).collect()
    }
}
