//! Report ingestion

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::core::store::{NewReport, ReportStore};
use crate::core::{CoreError, CoreResult, StoredReport, DEFAULT_LOCATION};

/// Largest count the store can hold (SQLite INTEGER is signed 64-bit)
pub const MAX_COUNT: u64 = i64::MAX as u64;

/// Checks a raw report payload and extracts its fields.
///
/// `timestamp` must be a string and `count` a non-negative integer. A missing
/// or null `location` becomes [`DEFAULT_LOCATION`].
pub fn validate_report(raw: &Value) -> CoreResult<NewReport> {
    let obj = raw
        .as_object()
        .ok_or_else(|| CoreError::Validation("Report must be a JSON object".to_string()))?;

    let timestamp = match obj.get("timestamp") {
        None | Some(Value::Null) => {
            return Err(CoreError::Validation("Missing field: timestamp".to_string()))
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(CoreError::Validation(format!(
                "Field 'timestamp' must be a string, got {}",
                other
            )))
        }
    };

    let count = match obj.get("count") {
        None | Some(Value::Null) => {
            return Err(CoreError::Validation("Missing field: count".to_string()))
        }
        Some(value) => value
            .as_u64()
            .filter(|count| *count <= MAX_COUNT)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Field 'count' must be an integer between 0 and {}, got {}",
                    MAX_COUNT, value
                ))
            })?,
    };

    let location = match obj.get("location") {
        None | Some(Value::Null) => DEFAULT_LOCATION.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(CoreError::Validation(format!(
                "Field 'location' must be a string, got {}",
                other
            )))
        }
    };

    Ok(NewReport {
        timestamp,
        count,
        location,
    })
}

/// Validates and durably appends reports
#[derive(Clone, Debug)]
pub struct IngestionService {
    db_path: PathBuf,
}

impl IngestionService {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Validates a raw payload and appends it as a new stored report.
    ///
    /// Identical payloads are stored again; there is no deduplication.
    pub fn submit(&self, raw: &Value) -> CoreResult<StoredReport> {
        let report = validate_report(raw)?;
        let store = ReportStore::open(&self.db_path)?;
        let stored = store.append(&report)?;

        info!(
            "Report stored: id={} time={} count={} location={}",
            stored.id, stored.timestamp, stored.count, stored.location
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_complete_report() {
        let report =
            validate_report(&json!({"timestamp": "14:00", "count": 150, "location": "Test"}))
                .unwrap();
        assert_eq!(report.timestamp, "14:00");
        assert_eq!(report.count, 150);
        assert_eq!(report.location, "Test");
    }

    #[test]
    fn test_validate_defaults_location() {
        let report = validate_report(&json!({"timestamp": "14:00", "count": 150})).unwrap();
        assert_eq!(report.location, "N/A");

        let report =
            validate_report(&json!({"timestamp": "14:00", "count": 1, "location": null})).unwrap();
        assert_eq!(report.location, "N/A");
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let err = validate_report(&json!({"count": 150})).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ref m) if m.contains("timestamp")));

        let err = validate_report(&json!({"timestamp": "14:00"})).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ref m) if m.contains("count")));
    }

    #[test]
    fn test_validate_rejects_malformed_fields() {
        assert!(validate_report(&json!({"timestamp": "14:00", "count": -1})).is_err());
        assert!(validate_report(&json!({"timestamp": "14:00", "count": 1.5})).is_err());
        assert!(validate_report(&json!({"timestamp": "14:00", "count": "3"})).is_err());
        assert!(validate_report(&json!({"timestamp": 1400, "count": 3})).is_err());
        assert!(validate_report(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_validate_rejects_count_beyond_storage_range() {
        let result = validate_report(&json!({"timestamp": "14:00", "count": u64::MAX}));
        assert!(matches!(result, Err(CoreError::Validation(_))));

        let largest = validate_report(&json!({"timestamp": "14:00", "count": MAX_COUNT})).unwrap();
        assert_eq!(largest.count, MAX_COUNT);
    }

    #[test]
    fn test_submit_stores_report() {
        let dir = tempfile::tempdir().unwrap();
        let service = IngestionService::new(dir.path().join("trafic.db"));

        let stored = service
            .submit(&json!({"timestamp": "14:00", "count": 150}))
            .unwrap();

        assert_eq!(
            stored,
            StoredReport {
                id: 1,
                timestamp: "14:00".to_string(),
                count: 150,
                location: "N/A".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_submit_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trafic.db");
        let service = IngestionService::new(&path);

        assert!(service.submit(&json!({"count": 150})).is_err());
        assert!(service.submit(&json!({"timestamp": "14:00"})).is_err());

        let store = ReportStore::open(&path).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_resubmission_is_not_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let service = IngestionService::new(dir.path().join("trafic.db"));
        let payload = json!({"timestamp": "14:00", "count": 4, "location": "Test"});

        let first = service.submit(&payload).unwrap();
        let second = service.submit(&payload).unwrap();
        assert_eq!(first.id + 1, second.id);
    }

    #[test]
    fn test_unwritable_database_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory can't be opened as a database file.
        let service = IngestionService::new(dir.path());

        let err = service
            .submit(&json!({"timestamp": "14:00", "count": 1}))
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}
