//! Counting Engine
//!
//! Maintains per-identity track state and decides, per identity, whether it
//! has moved far enough from where it was first seen to be counted.
//!
//! An identity is counted at most once while its state is retained. Stationary
//! objects (parked cars, false positives) never cross the displacement
//! threshold and are never counted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::{FrameIndex, Observation, Position, TrackId};

/// Default minimum displacement (pixels) before an identity is counted
pub const DEFAULT_MIN_DISPLACEMENT: f64 = 100.0;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Clone, Debug)]
pub struct CountingConfig {
    /// Displacement from the first-seen position that must be exceeded
    pub min_displacement: f64,
    /// Drop identities unseen for this many frames (0 keeps them forever)
    pub eviction_frames: u64,
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            min_displacement: DEFAULT_MIN_DISPLACEMENT,
            eviction_frames: 0,
        }
    }
}

// =============================================================================
// Track State
// =============================================================================

/// Tracking state for one identity
#[derive(Clone, Debug, PartialEq)]
pub struct TrackState {
    pub identity: TrackId,
    /// Set once, on first observation
    pub first_seen: Position,
    pub last_seen: Position,
    /// Flips to true at most once
    pub counted: bool,
    /// Frame in which the identity was last observed
    pub last_frame: FrameIndex,
}

impl TrackState {
    fn new(identity: TrackId, position: Position, frame: FrameIndex) -> Self {
        Self {
            identity,
            first_seen: position,
            last_seen: position,
            counted: false,
            last_frame: frame,
        }
    }

    /// Distance travelled from the first-seen position
    pub fn displacement(&self) -> f64 {
        self.first_seen.distance_to(&self.last_seen)
    }
}

/// Result of processing one frame
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameUpdate {
    /// Identities that crossed the threshold in this frame, in observation order
    pub newly_counted: Vec<TrackId>,
    /// Running total after this frame
    pub total: u64,
}

// =============================================================================
// Running Total Snapshot
// =============================================================================

/// Read-only, thread-safe view of the engine's running total
#[derive(Clone, Debug)]
pub struct TotalHandle {
    total: Arc<AtomicU64>,
}

impl TotalHandle {
    pub fn get(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }
}

// =============================================================================
// Counting Engine
// =============================================================================

/// Stateful unique-object counter
pub struct CountingEngine {
    config: CountingConfig,
    tracks: HashMap<TrackId, TrackState>,
    total: Arc<AtomicU64>,
    frame: FrameIndex,
}

impl CountingEngine {
    pub fn new(config: CountingConfig) -> Self {
        Self {
            config,
            tracks: HashMap::new(),
            total: Arc::new(AtomicU64::new(0)),
            frame: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CountingConfig::default())
    }

    /// Processes one frame's observations
    pub fn update(&mut self, observations: &[Observation]) -> FrameUpdate {
        self.frame += 1;
        let frame = self.frame;
        let threshold = self.config.min_displacement;
        let mut newly_counted = Vec::new();

        for obs in observations {
            let track = self
                .tracks
                .entry(obs.identity)
                .or_insert_with(|| TrackState::new(obs.identity, obs.position, frame));
            track.last_seen = obs.position;
            track.last_frame = frame;

            if track.counted {
                continue;
            }

            let displacement = track.displacement();
            if displacement > threshold {
                track.counted = true;
                self.total.fetch_add(1, Ordering::AcqRel);
                newly_counted.push(obs.identity);
                info!(
                    "Counted vehicle ID {} (moved {:.0}px)",
                    obs.identity, displacement
                );
            }
        }

        self.evict_stale();

        FrameUpdate {
            newly_counted,
            total: self.total(),
        }
    }

    fn evict_stale(&mut self) {
        let max_idle = self.config.eviction_frames;
        if max_idle == 0 {
            return;
        }

        let frame = self.frame;
        let before = self.tracks.len();
        self.tracks
            .retain(|_, track| frame - track.last_frame <= max_idle);

        let evicted = before - self.tracks.len();
        if evicted > 0 {
            debug!("Evicted {} idle tracks at frame {}", evicted, frame);
        }
    }

    /// Current running total
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Snapshot handle for readers on other tasks
    pub fn total_handle(&self) -> TotalHandle {
        TotalHandle {
            total: Arc::clone(&self.total),
        }
    }

    /// Number of identities currently tracked
    pub fn tracked_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, identity: TrackId) -> Option<&TrackState> {
        self.tracks.get(&identity)
    }

    /// Frames processed so far
    pub fn frames_processed(&self) -> FrameIndex {
        self.frame
    }

    pub fn config(&self) -> &CountingConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================
