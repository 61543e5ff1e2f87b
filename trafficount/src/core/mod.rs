//! Trafficount Core Engine
//!
//! Counting, interval reporting and report history.

pub mod counting;
pub mod detection;
pub mod history;
pub mod location;
pub mod pipeline;
pub mod reporting;
pub mod settings;
pub mod store;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
