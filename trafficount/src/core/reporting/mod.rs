//! Reporting Module
//!
//! Periodically turns the counting engine's running total into interval
//! reports and hands them to the ingestion service.

pub mod clock;
pub mod scheduler;
pub mod sink;

pub use clock::BucketClock;
pub use scheduler::{FlushOutcome, ReportScheduler, SchedulerConfig, SchedulerStats};
pub use sink::{HttpReportSink, ReportSink};
