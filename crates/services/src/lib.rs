#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod stats_service;
pub mod study_service;
pub mod vocabulary_join;

pub use vocab_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, StudyServiceError};
pub use stats_service::StatsService;
pub use study_service::{ActionOutcome, StudyService, StudyStats, WordListRequest};
