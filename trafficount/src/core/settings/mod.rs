//! Settings Persistence System
//!
//! Provides persistent settings for the counting pipeline and the history
//! service with:
//! - Atomic file writes (temp file + rename)
//! - Schema validation with defaults
//! - Migration support for schema changes
//!
//! Storage location: {config_dir}/trafficount/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::counting::CountingConfig;
use crate::core::{CoreError, CoreResult};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "settings.json.lock";

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub counting: CountingSettings,

    #[serde(default)]
    pub reporting: ReportingSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            counting: CountingSettings::default(),
            reporting: ReportingSettings::default(),
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AppSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Corrects bad values instead of failing, so hand-edited configs don't
    /// stop the pipeline from starting.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        self.counting.min_displacement =
            clamp_f64(self.counting.min_displacement, 1.0, 10_000.0, default_min_displacement());
        self.counting.vehicle_class_ids.sort_unstable();
        self.counting.vehicle_class_ids.dedup();

        self.reporting.interval_seconds = self.reporting.interval_seconds.clamp(1, 86_400);
        self.reporting.request_timeout_secs = self.reporting.request_timeout_secs.clamp(1, 300);
        if self.reporting.location_name.trim().is_empty() {
            self.reporting.location_name = default_location_name();
        }
        if self.reporting.timezone.trim().is_empty() {
            self.reporting.timezone = default_timezone();
        }
        if self.reporting.api_endpoint.trim().is_empty() {
            self.reporting.api_endpoint = default_api_endpoint();
        }
        if matches!(&self.reporting.video_source, Some(s) if s.trim().is_empty()) {
            self.reporting.video_source = None;
        }

        if self.server.bind_addr.trim().is_empty() {
            self.server.bind_addr = default_bind_addr();
        }
        if self.server.database_path.as_os_str().is_empty() {
            self.server.database_path = default_database_path();
        }
    }

    /// Counting engine configuration derived from these settings
    pub fn counting_config(&self) -> CountingConfig {
        CountingConfig {
            min_displacement: self.counting.min_displacement,
            eviction_frames: self.counting.track_eviction_frames,
        }
    }
}

fn clamp_f64(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(min, max)
}

// =============================================================================
// Counting Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CountingSettings {
    /// Pixels an identity must travel from its first position to be counted
    #[serde(default = "default_min_displacement")]
    pub min_displacement: f64,

    /// Frames after which an unseen identity is forgotten (0 = never)
    #[serde(default)]
    pub track_eviction_frames: u64,

    /// Detector class ids treated as vehicles (COCO: 2=car, 3=motorcycle, 5=bus, 7=truck)
    #[serde(default = "default_vehicle_class_ids")]
    pub vehicle_class_ids: Vec<u32>,
}

impl Default for CountingSettings {
    fn default() -> Self {
        Self {
            min_displacement: default_min_displacement(),
            track_eviction_frames: 0,
            vehicle_class_ids: default_vehicle_class_ids(),
        }
    }
}

fn default_min_displacement() -> f64 {
    crate::core::counting::engine::DEFAULT_MIN_DISPLACEMENT
}

fn default_vehicle_class_ids() -> Vec<u32> {
    vec![2, 3, 5, 7]
}

// =============================================================================
// Reporting Settings
// =============================================================================

/// What the scheduler does with an interval whose report could not be delivered
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryPolicy {
    /// Drop the interval's count and move on
    #[default]
    Discard,
    /// Keep the baseline so the count is merged into the next report
    CarryOver,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportingSettings {
    /// Seconds between reports
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Camera location label sent with every report
    #[serde(default = "default_location_name")]
    pub location_name: String,

    /// IANA time zone of the camera (e.g. "America/New_York")
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Ingestion endpoint reports are POSTed to
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,

    /// HTTP timeout for report delivery
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub delivery_policy: DeliveryPolicy,

    /// Camera page URL, used to auto-detect the location label
    #[serde(default)]
    pub video_source: Option<String>,
}

impl Default for ReportingSettings {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            location_name: default_location_name(),
            timezone: default_timezone(),
            api_endpoint: default_api_endpoint(),
            request_timeout_secs: default_request_timeout(),
            delivery_policy: DeliveryPolicy::default(),
            video_source: None,
        }
    }
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_location_name() -> String {
    "Unknown location".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_api_endpoint() -> String {
    "http://127.0.0.1:5000/api/report".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

// =============================================================================
// Server Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SQLite database holding stored reports
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_path: default_database_path(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("trafic.db")
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoggingSettings {
    /// Directory for daily rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Default directory holding `settings.json`
pub fn default_settings_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trafficount")
}

/// Settings manager for loading, saving, and resetting settings
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager with the given settings directory
    pub fn new(settings_dir: PathBuf) -> Self {
        Self {
            settings_path: settings_dir.join(SETTINGS_FILE),
        }
    }

    /// Create a settings manager for an explicit settings file path
    pub fn for_file(path: PathBuf) -> Self {
        Self {
            settings_path: path,
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    fn with_lock<T>(
        &self,
        exclusive: bool,
        op: impl FnOnce() -> CoreResult<T>,
    ) -> CoreResult<T> {
        // Ensure parent directory exists so the lock file can be created.
        if let Some(parent) = self.settings_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    CoreError::Settings(format!("Failed to create settings directory: {}", e))
                })?;
            }
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| CoreError::Settings(format!("Failed to open settings lock file: {}", e)))?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file).map_err(|e| {
                CoreError::Settings(format!("Failed to lock settings file (exclusive): {}", e))
            })?;
        } else {
            fs2::FileExt::lock_shared(&lock_file).map_err(|e| {
                CoreError::Settings(format!("Failed to lock settings file (shared): {}", e))
            })?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock settings lock file: {}", e);
        }

        result
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file doesn't exist.
    /// Read and parse failures are surfaced.
    pub fn try_load(&self) -> CoreResult<AppSettings> {
        self.with_lock(false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(AppSettings::default());
            }

            let content = fs::read_to_string(&self.settings_path)
                .map_err(|e| CoreError::Settings(format!("Failed to read settings file: {}", e)))?;

            let mut settings = serde_json::from_str::<AppSettings>(&content)
                .map_err(|e| CoreError::Settings(format!("Failed to parse settings file: {}", e)))?;

            if settings.version < SETTINGS_VERSION {
                info!(
                    "Migrating settings from version {} to {}",
                    settings.version, SETTINGS_VERSION
                );
                settings = self.migrate(settings);
            }

            settings.normalize();
            Ok(settings)
        })
    }

    /// Save settings to disk using atomic write (temp file + rename)
    pub fn save(&self, settings: &AppSettings) -> CoreResult<AppSettings> {
        self.with_lock(true, || {
            let mut normalized = settings.clone();
            normalized.normalize();

            let content = serde_json::to_string_pretty(&normalized)?;

            let temp_path = self.settings_path.with_extension("json.tmp");
            if temp_path.exists() {
                let _ = fs::remove_file(&temp_path);
            }

            let mut file = fs::File::create(&temp_path).map_err(|e| {
                CoreError::Settings(format!("Failed to create temp settings file: {}", e))
            })?;
            file.write_all(content.as_bytes())
                .map_err(|e| CoreError::Settings(format!("Failed to write settings: {}", e)))?;
            file.sync_all()
                .map_err(|e| CoreError::Settings(format!("Failed to sync settings file: {}", e)))?;

            fs::rename(&temp_path, &self.settings_path).map_err(|e| {
                CoreError::Settings(format!("Failed to finalize settings file: {}", e))
            })?;

            info!("Settings saved to {:?}", self.settings_path);
            Ok(normalized)
        })
    }

    /// Reset settings to defaults and delete the settings file
    pub fn reset(&self) -> CoreResult<AppSettings> {
        self.with_lock(true, || {
            if self.settings_path.exists() {
                fs::remove_file(&self.settings_path).map_err(|e| {
                    CoreError::Settings(format!("Failed to delete settings file: {}", e))
                })?;
                info!("Settings file deleted");
            }
            Ok(AppSettings::default())
        })
    }

    fn migrate(&self, mut settings: AppSettings) -> AppSettings {
        settings.version = SETTINGS_VERSION;
        settings
    }
}
