use std::sync::Arc;

use storage::repository::Storage;
use vocab_core::model::StudySettings;

use crate::Clock;
use crate::error::AppServicesError;
use crate::stats_service::StatsService;
use crate::study_service::StudyService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    settings: StudySettings,
    study: Arc<StudyService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: StudySettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        tracing::info!(db_url, "storage ready");
        Ok(Self::from_storage(&storage, clock, settings))
    }

    /// Build services over an in-memory backend.
    #[must_use]
    pub fn in_memory(clock: Clock, settings: StudySettings) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, settings)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, settings: StudySettings) -> Self {
        let study = Arc::new(StudyService::new(clock, &settings, storage));
        Self { settings, study }
    }

    #[must_use]
    pub fn settings(&self) -> &StudySettings {
        &self.settings
    }

    #[must_use]
    pub fn study(&self) -> Arc<StudyService> {
        Arc::clone(&self.study)
    }

    #[must_use]
    pub fn stats(&self) -> StatsService {
        self.study.stats().clone()
    }
}
