use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ValidationError;
use crate::model::StudyDate;

/// Largest page a single list request may ask for.
pub const MAX_LIST_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(ValidationError::UnknownSortOrder(s.to_owned())),
        }
    }
}

/// Which instant a list is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    #[default]
    UpdatedAt,
}

impl SortField {
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for SortField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" | "created_at" => Ok(Self::CreatedAt),
            "updated" | "updated_at" => Ok(Self::UpdatedAt),
            _ => Err(ValidationError::UnknownSortField(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortSpec {
    #[must_use]
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// Stable order used for the new-word bucket.
    #[must_use]
    pub fn oldest_first() -> Self {
        Self::new(SortField::CreatedAt, SortOrder::Asc)
    }
}

/// Validated page size for list queries (`1..=MAX_LIST_LIMIT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListLimit(u32);

impl ListLimit {
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidLimit` when `value` is zero or above the cap.
    pub fn new(value: u32) -> Result<Self, ValidationError> {
        if value == 0 || value > MAX_LIST_LIMIT {
            return Err(ValidationError::InvalidLimit {
                provided: value,
                max: MAX_LIST_LIMIT,
            });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: StudyDate,
    end: StudyDate,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidDateRange` when `start > end`.
    pub fn new(start: StudyDate, end: StudyDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn start(&self) -> StudyDate {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> StudyDate {
        self.end
    }

    #[must_use]
    pub fn contains(&self, date: StudyDate) -> bool {
        self.start <= date && date <= self.end
    }
}
