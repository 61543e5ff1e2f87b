//! History Module
//!
//! Validates incoming interval reports, appends them to the report store and
//! replays the stored history for dashboards.
//!
//! Each call opens its own store handle, so services can be cloned freely
//! across concurrent requests; SQLite serializes the writers.

pub mod ingest;
pub mod query;

pub use ingest::{validate_report, IngestionService};
pub use query::QueryService;
