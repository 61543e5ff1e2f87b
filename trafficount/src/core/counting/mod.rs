//! Counting Module
//!
//! Turns per-frame tracker observations into a monotonically increasing
//! count of distinct moving objects.

pub mod engine;

pub use engine::{CountingConfig, CountingEngine, FrameUpdate, TotalHandle, TrackState};
