//! Trafficount Core Library
//!
//! Counts unique vehicles from tracked detections, rolls the running total up
//! into fixed-interval reports, and stores the reports behind a small HTTP
//! history service.
//!
//! - [`core`] holds the counting engine, report scheduler, report store and
//!   the ingestion/query services.
//! - [`server`] exposes the services over HTTP.

pub mod core;
pub mod server;

use std::path::Path;
use std::sync::OnceLock;

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Installs the global tracing subscriber.
///
/// Logs go to stderr so command output on stdout stays machine-readable. When
/// `log_dir` is set, a daily-rolling `trafficount.log` is written there too.
/// `RUST_LOG` refines the filter; INFO is always enabled.
pub fn init_logging(log_dir: Option<&Path>) {
    use tracing_subscriber::prelude::*;

    let file_layer = log_dir.and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Log directory {} unavailable: {}", dir.display(), e);
            return None;
        }
        let file_appender = tracing_appender::rolling::daily(dir, "trafficount.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
    });

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    // Already initialized (tests, repeated calls).
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        init_logging(Some(dir.path()));
        init_logging(None);
        tracing::info!("logging initialized twice");
        assert!(dir.path().exists());
    }
}
