//! trafficount-cli
//!
//! Runs the counting pipeline over tracked detections, serves the report
//! history over HTTP, or dumps the stored history.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use trafficount_lib::core::counting::CountingEngine;
use trafficount_lib::core::detection::JsonLinesFrameSource;
use trafficount_lib::core::history::QueryService;
use trafficount_lib::core::location::resolve_location;
use trafficount_lib::core::pipeline::run_pipeline;
use trafficount_lib::core::reporting::{HttpReportSink, ReportScheduler, SchedulerConfig};
use trafficount_lib::core::settings::{default_settings_dir, AppSettings, SettingsManager};
use trafficount_lib::server::{spawn_server, ServerInfo};

#[derive(Parser, Debug)]
#[command(name = "trafficount", version, about = "Unique vehicle counting and traffic history")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ingestion and history service
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:5000
        #[arg(long)]
        bind: Option<String>,
        /// SQLite database file
        #[arg(long, value_name = "PATH")]
        db: Option<PathBuf>,
    },
    /// Count vehicles from a JSON Lines detection stream and report totals
    Count {
        /// Detection stream, one frame per line (`-` for stdin)
        #[arg(long, value_name = "PATH")]
        frames: PathBuf,
        /// Ingestion endpoint receiving the interval reports
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
        /// Location label attached to every report
        #[arg(long)]
        location: Option<String>,
        /// Report interval in seconds
        #[arg(long)]
        interval: Option<u64>,
        /// IANA time zone used for report labels
        #[arg(long)]
        timezone: Option<String>,
        /// Minimum displacement in pixels before a vehicle is counted
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Print the stored report history as JSON
    History {
        /// SQLite database file
        #[arg(long, value_name = "PATH")]
        db: Option<PathBuf>,
    },
    /// Inspect or write the settings file
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the effective settings as JSON
    Show,
    /// Write the current settings (defaults filled in) to the settings file
    Init,
    /// Delete the settings file
    Reset,
}

fn settings_manager(config: Option<PathBuf>) -> SettingsManager {
    match config {
        Some(path) => SettingsManager::for_file(path),
        None => SettingsManager::new(default_settings_dir()),
    }
}

/// Loads settings. A missing file means defaults; an unreadable or corrupt
/// file is an error.
fn load_settings(manager: &SettingsManager) -> Result<AppSettings> {
    manager.try_load().with_context(|| {
        format!(
            "Invalid settings file {}",
            manager.settings_path().display()
        )
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let manager = settings_manager(cli.config);
    let mut settings = load_settings(&manager)?;

    trafficount_lib::init_logging(settings.logging.log_dir.as_deref());

    match cli.command {
        Command::Serve { bind, db } => {
            if let Some(bind) = bind {
                settings.server.bind_addr = bind;
            }
            if let Some(db) = db {
                settings.server.database_path = db;
            }
            settings.normalize();
            serve(settings).await
        }
        Command::Count {
            frames,
            endpoint,
            location,
            interval,
            timezone,
            threshold,
        } => {
            if let Some(endpoint) = endpoint {
                settings.reporting.api_endpoint = endpoint;
            }
            if let Some(location) = location {
                settings.reporting.location_name = location;
                // An explicit label wins over the page title lookup.
                settings.reporting.video_source = None;
            }
            if let Some(interval) = interval {
                settings.reporting.interval_seconds = interval;
            }
            if let Some(timezone) = timezone {
                settings.reporting.timezone = timezone;
            }
            if let Some(threshold) = threshold {
                settings.counting.min_displacement = threshold;
            }
            settings.normalize();
            count(settings, frames).await
        }
        Command::History { db } => {
            if let Some(db) = db {
                settings.server.database_path = db;
            }
            settings.normalize();
            history(settings)
        }
        Command::Settings { action } => settings_command(&manager, settings, action),
    }
}

fn settings_command(
    manager: &SettingsManager,
    settings: AppSettings,
    action: SettingsAction,
) -> Result<()> {
    let path = manager.settings_path().display().to_string();
    match action {
        SettingsAction::Show => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Init => {
            manager
                .save(&settings)
                .with_context(|| format!("Failed to write settings to {}", path))?;
            println!("Settings written to {}", path);
        }
        SettingsAction::Reset => {
            manager
                .reset()
                .with_context(|| format!("Failed to reset settings at {}", path))?;
            println!("Settings reset to defaults");
        }
    }
    Ok(())
}

async fn serve(settings: AppSettings) -> Result<()> {
    let server = spawn_server(
        &settings.server.bind_addr,
        settings.server.database_path.clone(),
        ServerInfo {
            location_name: settings.reporting.location_name.clone(),
            timezone: settings.reporting.timezone.clone(),
        },
    )
    .await
    .context("Failed to start the history service")?;

    tokio::select! {
        result = server.task => {
            result.context("History service task panicked")??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }
    Ok(())
}

async fn count(settings: AppSettings, frames: PathBuf) -> Result<()> {
    let location = resolve_location(
        settings.reporting.video_source.as_deref(),
        &settings.reporting.location_name,
    )
    .await;

    let sink = HttpReportSink::new(
        &settings.reporting.api_endpoint,
        Duration::from_secs(settings.reporting.request_timeout_secs),
    )
    .context("Failed to create the report client")?;
    let scheduler = ReportScheduler::new(SchedulerConfig::from_settings(&settings, location), sink);

    let source = JsonLinesFrameSource::open(&frames, settings.counting.vehicle_class_ids.clone())
        .with_context(|| format!("Detection source {} is unavailable", frames.display()))?;
    let engine = CountingEngine::new(settings.counting_config());

    info!(
        "Counting from {} (threshold {}px, reporting every {}s to {})",
        frames.display(),
        settings.counting.min_displacement,
        settings.reporting.interval_seconds,
        settings.reporting.api_endpoint
    );

    let summary = run_pipeline(source, engine, scheduler)
        .await
        .context("Counting pipeline stopped")?;

    println!("frames processed:   {}", summary.frames);
    println!("vehicles counted:   {}", summary.total_counted);
    println!("tracks at shutdown: {}", summary.active_tracks);
    println!(
        "reports delivered:  {} ({} vehicles)",
        summary.scheduler.reports_delivered, summary.scheduler.vehicles_reported
    );
    if summary.scheduler.reports_failed > 0 {
        println!(
            "reports failed:     {} ({} vehicles not delivered)",
            summary.scheduler.reports_failed, summary.scheduler.vehicles_dropped
        );
    }
    Ok(())
}

fn history(settings: AppSettings) -> Result<()> {
    let entries = QueryService::new(&settings.server.database_path)
        .list_all()
        .with_context(|| {
            format!(
                "Failed to read history from {}",
                settings.server.database_path.display()
            )
        })?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_count_flags_parse() {
        let cli = Cli::parse_from([
            "trafficount",
            "--config",
            "/tmp/settings.json",
            "count",
            "--frames",
            "-",
            "--interval",
            "30",
            "--threshold",
            "120.5",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/settings.json")));
        match cli.command {
            Command::Count {
                frames,
                interval,
                threshold,
                endpoint,
                ..
            } => {
                assert_eq!(frames, PathBuf::from("-"));
                assert_eq!(interval, Some(30));
                assert_eq!(threshold, Some(120.5));
                assert_eq!(endpoint, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_settings_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = settings_manager(Some(dir.path().join("absent.json")));
        let settings = load_settings(&manager).unwrap();
        assert_eq!(settings.reporting.interval_seconds, 60);
        assert_eq!(settings.server.bind_addr, "127.0.0.1:5000");
    }

    #[test]
    fn test_corrupt_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_settings(&settings_manager(Some(path))).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.json"));
    }

    #[test]
    fn test_settings_init_then_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let manager = settings_manager(Some(path.clone()));

        let mut settings = load_settings(&manager).unwrap();
        settings.reporting.location_name = "Adams Street".to_string();
        settings_command(&manager, settings, SettingsAction::Init).unwrap();
        assert!(path.exists());
        assert_eq!(
            load_settings(&manager).unwrap().reporting.location_name,
            "Adams Street"
        );

        settings_command(&manager, AppSettings::default(), SettingsAction::Reset).unwrap();
        assert!(!path.exists());
    }
}
