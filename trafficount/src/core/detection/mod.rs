//! Detection Source Module
//!
//! Adapts the external detector/tracker output into per-frame observation
//! sets for the counting engine.
//!
//! The wire format is JSON Lines: one frame per line, each line an array of
//! `{"id", "x", "y", "w", "h", "class"}` objects where `(x, y)` is the box
//! center. Observations without an identity or a center are rejected here,
//! before they reach the engine.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::{CoreError, CoreResult, Observation, TrackId};

// =============================================================================
// Raw Detection
// =============================================================================

/// One tracked box as emitted by the detector
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct RawDetection {
    #[serde(default)]
    pub id: Option<TrackId>,
    /// Box center
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    /// Box size (unused by counting)
    #[serde(default)]
    pub w: Option<f64>,
    #[serde(default)]
    pub h: Option<f64>,
    /// Detector class id
    #[serde(default, rename = "class")]
    pub class_id: Option<u32>,
}

impl RawDetection {
    /// Converts to an observation, or `None` if identity or center is missing
    pub fn to_observation(&self) -> Option<Observation> {
        match (self.id, self.x, self.y) {
            (Some(id), Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
                Some(Observation::new(id, x, y))
            }
            _ => None,
        }
    }
}

// =============================================================================
// Frame Source
// =============================================================================

/// Supplies one frame of observations at a time
pub trait FrameSource: Send {
    /// Next frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> CoreResult<Option<Vec<Observation>>>;
}

/// Counters for input the source refused
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames: u64,
    pub malformed_lines: u64,
    pub rejected_observations: u64,
    pub filtered_by_class: u64,
}

/// Reads frames from a JSON Lines stream
pub struct JsonLinesFrameSource {
    reader: Box<dyn BufRead + Send>,
    vehicle_classes: Vec<u32>,
    line_number: usize,
    stats: SourceStats,
}

impl JsonLinesFrameSource {
    pub fn new(reader: Box<dyn BufRead + Send>, vehicle_classes: Vec<u32>) -> Self {
        Self {
            reader,
            vehicle_classes,
            line_number: 0,
            stats: SourceStats::default(),
        }
    }

    /// Opens a file path, or stdin when the path is `-`
    pub fn open(path: &Path, vehicle_classes: Vec<u32>) -> CoreResult<Self> {
        if path.as_os_str() == "-" {
            let stdin = BufReader::new(std::io::stdin());
            return Ok(Self::new(Box::new(stdin), vehicle_classes));
        }

        let file = File::open(path).map_err(|e| {
            CoreError::DetectionSource(format!("Cannot open {}: {}", path.display(), e))
        })?;
        Ok(Self::new(Box::new(BufReader::new(file)), vehicle_classes))
    }

    pub fn stats(&self) -> &SourceStats {
        &self.stats
    }

    fn accepts_class(&self, class_id: Option<u32>) -> bool {
        match class_id {
            None => true,
            Some(_) if self.vehicle_classes.is_empty() => true,
            Some(class) => self.vehicle_classes.contains(&class),
        }
    }

    fn parse_frame(&mut self, line: &str) -> Option<Vec<Observation>> {
        let detections = match serde_json::from_str::<Vec<RawDetection>>(line) {
            Ok(detections) => detections,
            Err(e) => {
                warn!(
                    "Skipping malformed frame at line {}: {}",
                    self.line_number, e
                );
                self.stats.malformed_lines += 1;
                return None;
            }
        };

        let mut observations = Vec::with_capacity(detections.len());
        for detection in &detections {
            if !self.accepts_class(detection.class_id) {
                self.stats.filtered_by_class += 1;
                continue;
            }
            match detection.to_observation() {
                Some(obs) => observations.push(obs),
                None => {
                    debug!(
                        "Rejected observation without identity or position at line {}: {:?}",
                        self.line_number, detection
                    );
                    self.stats.rejected_observations += 1;
                }
            }
        }
        Some(observations)
    }
}

impl FrameSource for JsonLinesFrameSource {
    fn next_frame(&mut self) -> CoreResult<Option<Vec<Observation>>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self.reader.read_line(&mut line).map_err(|e| {
                CoreError::DetectionSource(format!(
                    "Read failed after line {}: {}",
                    self.line_number, e
                ))
            })?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let frame = self.parse_frame(trimmed);
            if let Some(observations) = frame {
                self.stats.frames += 1;
                return Ok(Some(observations));
            }
        }
    }
}

/// In-memory frame source (for testing and replay)
pub struct VecFrameSource {
    frames: std::vec::IntoIter<Vec<Observation>>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<Vec<Observation>>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> CoreResult<Option<Vec<Observation>>> {
        Ok(self.frames.next())
    }
}
