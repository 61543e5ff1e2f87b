//! Report Store Module
//!
//! SQLite database holding the append-only history of interval reports.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection};
use tracing::info;

use crate::core::{CoreError, CoreResult, ReportId, StoredReport, DEFAULT_LOCATION};

/// How long a writer waits for a concurrent writer's lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// New Report
// =============================================================================

/// A validated report that has not been stored yet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReport {
    pub timestamp: String,
    pub count: u64,
    pub location: String,
}

// =============================================================================
// Report Store
// =============================================================================

/// Append-only SQLite store of interval reports
pub struct ReportStore {
    conn: Connection,
}

impl ReportStore {
    /// Opens the store at the specified path, creating or migrating the schema
    pub fn open<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| CoreError::Storage(format!("Failed to open report database: {}", e)))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| CoreError::Storage(format!("Failed to set busy timeout: {}", e)))?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Creates an in-memory store (for testing)
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CoreError::Storage(format!("Failed to create in-memory database: {}", e))
        })?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Creates the reports table, or adds columns missing from older versions
    fn init_schema(&self) -> CoreResult<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS reports (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp TEXT NOT NULL,
                    count INTEGER NOT NULL,
                    location TEXT
                );
                "#,
            )
            .map_err(|e| CoreError::Storage(format!("Failed to initialize schema: {}", e)))?;

        if !self.has_column("reports", "location")? && self.add_location_column()? {
            info!("Added 'location' column to reports table");
        }

        Ok(())
    }

    /// Adds the `location` column. Returns false if another connection added
    /// it between the schema check and the ALTER.
    fn add_location_column(&self) -> CoreResult<bool> {
        match self
            .conn
            .execute("ALTER TABLE reports ADD COLUMN location TEXT", [])
        {
            Ok(_) => Ok(true),
            Err(e) if e.to_string().contains("duplicate column name") => Ok(false),
            Err(e) => Err(CoreError::Storage(format!(
                "Failed to add location column: {}",
                e
            ))),
        }
    }

    fn has_column(&self, table: &str, column: &str) -> CoreResult<bool> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .map_err(|e| CoreError::Storage(format!("Failed to inspect schema: {}", e)))?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(|e| CoreError::Storage(format!("Failed to inspect schema: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::Storage(format!("Failed to inspect schema: {}", e)))?;

        Ok(names.iter().any(|name| name == column))
    }

    /// Gets the underlying connection (for module-level access)
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Appends a report and returns it with its assigned sequence id
    pub fn append(&self, report: &NewReport) -> CoreResult<StoredReport> {
        let count = i64::try_from(report.count)
            .map_err(|_| CoreError::Storage(format!("Count out of range: {}", report.count)))?;

        self.conn
            .execute(
                "INSERT INTO reports (timestamp, count, location) VALUES (?1, ?2, ?3)",
                params![report.timestamp, count, report.location],
            )
            .map_err(|e| CoreError::Storage(format!("Failed to insert report: {}", e)))?;

        let id: ReportId = self.conn.last_insert_rowid();

        Ok(StoredReport {
            id,
            timestamp: report.timestamp.clone(),
            count: report.count,
            location: report.location.clone(),
        })
    }

    /// All reports, ascending by timestamp label, then by insertion order
    pub fn list_by_timestamp(&self) -> CoreResult<Vec<StoredReport>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, count, location FROM reports
                 ORDER BY timestamp ASC, id ASC",
            )
            .map_err(|e| CoreError::Storage(format!("Failed to prepare history query: {}", e)))?;

        let reports = stmt
            .query_map([], row_to_report)
            .map_err(|e| CoreError::Storage(format!("Failed to query reports: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::Storage(format!("Failed to read report row: {}", e)))?;

        Ok(reports)
    }

    /// Number of stored reports
    pub fn len(&self) -> CoreResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))
            .map_err(|e| CoreError::Storage(format!("Failed to get report count: {}", e)))?;

        Ok(count as usize)
    }

    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

fn row_to_report(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredReport> {
    let count: i64 = row.get(2)?;
    let location: Option<String> = row.get(3)?;

    Ok(StoredReport {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        count: count.max(0) as u64,
        location: location.unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
    })
}

// =============================================================================
// Tests
// =============================================================================
