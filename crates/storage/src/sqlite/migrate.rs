use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates word records, daily stats and the vocabulary catalog.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        // id is "{learner_id}_{word_id}"; progress columns are all set or all NULL
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS word_records (
                    id TEXT PRIMARY KEY,
                    learner_id INTEGER NOT NULL,
                    word_id INTEGER NOT NULL,
                    level INTEGER CHECK (level IS NULL OR level >= 0),
                    first_learn_date TEXT,
                    next_review_date TEXT,
                    actual_learn_dates TEXT NOT NULL DEFAULT '[]',
                    actual_review_dates TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    CHECK (
                        (level IS NULL AND first_learn_date IS NULL AND next_review_date IS NULL)
                        OR (level IS NOT NULL AND first_learn_date IS NOT NULL AND next_review_date IS NOT NULL)
                    )
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS daily_stats (
                    learner_id INTEGER NOT NULL,
                    date TEXT NOT NULL,
                    learned_count INTEGER NOT NULL DEFAULT 0 CHECK (learned_count >= 0),
                    reviewed_count INTEGER NOT NULL DEFAULT 0 CHECK (reviewed_count >= 0),
                    PRIMARY KEY (learner_id, date)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS vocabulary (
                    word_id INTEGER PRIMARY KEY,
                    spelling TEXT NOT NULL,
                    pronunciations TEXT NOT NULL DEFAULT '[]',
                    translations TEXT NOT NULL DEFAULT '[]'
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_word_records_learner_next_review
                    ON word_records (learner_id, next_review_date, level);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_word_records_learner_first_learn
                    ON word_records (learner_id, first_learn_date);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    } else {
        tracing::debug!(version = 1, "schema migration already applied");
    }

    Ok(())
}
