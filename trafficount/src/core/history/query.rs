//! History queries

use std::path::{Path, PathBuf};

use crate::core::store::ReportStore;
use crate::core::{CoreResult, HistoryEntry};

/// Replays stored reports for dashboards
#[derive(Clone, Debug)]
pub struct QueryService {
    db_path: PathBuf,
}

impl QueryService {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    /// All stored reports, ascending by their timestamp label.
    ///
    /// Labels are clock times without a date, so the order is only
    /// chronological for reports from a single day.
    pub fn list_all(&self) -> CoreResult<Vec<HistoryEntry>> {
        let store = ReportStore::open(&self.db_path)?;
        let rows = store.list_by_timestamp()?;
        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }
}
