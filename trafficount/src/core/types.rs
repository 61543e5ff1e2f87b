//! Trafficount Core Type Definitions
//!
//! Defines fundamental types shared by the counting, reporting and storage layers.

use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Tracker-assigned identity of one physical object (not guaranteed stable)
pub type TrackId = i64;

/// Sequence number assigned to a stored report
pub type ReportId = i64;

/// Index of a processed frame, starting at 1 for the first frame
pub type FrameIndex = u64;

// =============================================================================
// Spatial Types
// =============================================================================

/// 2D position in detector pixel units
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position
    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One identity seen at one position in one frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub identity: TrackId,
    pub position: Position,
}

impl Observation {
    pub fn new(identity: TrackId, x: f64, y: f64) -> Self {
        Self {
            identity,
            position: Position::new(x, y),
        }
    }
}

// =============================================================================
// Report Types
// =============================================================================

/// Location label used when a report does not name one
pub const DEFAULT_LOCATION: &str = "N/A";

/// Aggregated count for one reporting interval, as sent to the ingestion service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Bucket label (clock time in the camera's time zone, e.g. "14:00")
    pub timestamp: String,
    /// Vehicles counted since the previous report
    pub count: u64,
    /// Human-readable camera location
    pub location: String,
}

/// A report after it has been appended to the store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReport {
    pub id: ReportId,
    pub timestamp: String,
    pub count: u64,
    pub location: String,
}

/// History row as exposed to dashboards
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub count: u64,
    pub location: String,
}

impl From<StoredReport> for HistoryEntry {
    fn from(report: StoredReport) -> Self {
        Self {
            timestamp: report.timestamp,
            count: report.count,
            location: report.location,
        }
    }
}
