//! Work source — where the list of CIDs to audit comes from.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::WorkItem;

pub mod store;

pub use store::ContentIndex;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open content index at {path}")]
    Connection {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("content index at {path} is missing table '{table}'")]
    MissingSchema { path: PathBuf, table: &'static str },

    #[error("invalid query filter: {0}")]
    InvalidFilter(String),

    #[error("content query failed")]
    Query(#[from] rusqlite::Error),

    #[error("content row for {cid} has unparseable created_at '{value}'")]
    InvalidRow { cid: String, value: String },
}

/// Which contents to select: everything stored on `location` and created
/// between `from` and `to`, both days included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    pub location: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl SourceQuery {
    pub fn new(location: impl Into<String>, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            location: location.into(),
            from,
            to,
        }
    }

    pub fn validate(&self) -> Result<(), SourceError> {
        if self.location.trim().is_empty() {
            return Err(SourceError::InvalidFilter("location filter is empty".into()));
        }
        if self.from > self.to {
            return Err(SourceError::InvalidFilter(format!(
                "from date {} is after to date {}",
                self.from, self.to
            )));
        }
        Ok(())
    }
}

/// Produces the ordered, finite list of items for one run.
pub trait WorkSource: Send + Sync {
    fn query(&self, query: &SourceQuery) -> Result<Vec<WorkItem>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_validate_accepts_single_day() {
        let q = SourceQuery::new("shuttle-1", day(2023, 1, 1), day(2023, 1, 1));
        assert!(q.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_location() {
        let q = SourceQuery::new("  ", day(2023, 1, 1), day(2023, 2, 1));
        assert!(matches!(q.validate(), Err(SourceError::InvalidFilter(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let q = SourceQuery::new("shuttle-1", day(2023, 2, 1), day(2023, 1, 1));
        assert!(matches!(q.validate(), Err(SourceError::InvalidFilter(_))));
    }
}
