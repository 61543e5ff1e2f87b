//! Report Scheduler
//!
//! Flushes the increment of the running total since the previous flush as
//! one [`Report`] per interval.
//!
//! The scheduler only reads the running total. It owns the baseline (the
//! total at the last flush), so every report carries a non-negative delta
//! and consecutive reports never overlap.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::{BucketClock, ReportSink};
use crate::core::counting::TotalHandle;
use crate::core::settings::{AppSettings, DeliveryPolicy};
use crate::core::Report;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Time between flushes
    pub interval: Duration,
    /// Location label attached to every report
    pub location: String,
    /// Zone used to label reports
    pub clock: BucketClock,
    pub delivery_policy: DeliveryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            location: "Unknown location".to_string(),
            clock: BucketClock::default(),
            delivery_policy: DeliveryPolicy::Discard,
        }
    }
}

impl SchedulerConfig {
    /// Builds the scheduler configuration from settings and a resolved location
    pub fn from_settings(settings: &AppSettings, location: String) -> Self {
        Self {
            interval: Duration::from_secs(settings.reporting.interval_seconds),
            location,
            clock: BucketClock::from_name(&settings.reporting.timezone),
            delivery_policy: settings.reporting.delivery_policy,
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of one flush
#[derive(Clone, Debug, PartialEq)]
pub enum FlushOutcome {
    /// The sink accepted the report
    Delivered(Report),
    /// Delivery failed and the interval's count was discarded
    Dropped { report: Report, error: String },
    /// Delivery failed and the count stays pending for the next report
    CarriedOver { report: Report, error: String },
}

impl FlushOutcome {
    pub fn report(&self) -> &Report {
        match self {
            FlushOutcome::Delivered(report)
            | FlushOutcome::Dropped { report, .. }
            | FlushOutcome::CarriedOver { report, .. } => report,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, FlushOutcome::Delivered(_))
    }
}

/// Counters accumulated over the scheduler's lifetime
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub reports_delivered: u64,
    pub reports_failed: u64,
    /// Vehicles carried by delivered reports
    pub vehicles_reported: u64,
    /// Vehicles lost to failed deliveries under the discard policy
    pub vehicles_dropped: u64,
}

// =============================================================================
// Scheduler
// =============================================================================

pub struct ReportScheduler<S: ReportSink> {
    config: SchedulerConfig,
    sink: S,
    baseline: u64,
    last_flush: Instant,
    stats: SchedulerStats,
}

impl<S: ReportSink> ReportScheduler<S> {
    pub fn new(config: SchedulerConfig, sink: S) -> Self {
        Self {
            config,
            sink,
            baseline: 0,
            last_flush: Instant::now(),
            stats: SchedulerStats::default(),
        }
    }

    /// Restarts the interval timer from `at`
    pub fn reset_timer(&mut self, at: Instant) {
        self.last_flush = at;
    }

    /// Whether a full interval has elapsed since the last flush
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_flush) >= self.config.interval
    }

    /// Total at the previous flush
    pub fn baseline(&self) -> u64 {
        self.baseline
    }

    /// Vehicles counted but not yet reported
    pub fn pending(&self, total: u64) -> u64 {
        total.saturating_sub(self.baseline)
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Flushes if the interval has elapsed
    pub async fn poll(&mut self, now: Instant, total: u64) -> Option<FlushOutcome> {
        if !self.is_due(now) {
            return None;
        }
        Some(self.flush(now, total, Utc::now()).await)
    }

    /// Builds and delivers the report for the interval ending at `now`.
    ///
    /// The timer always restarts. The baseline advances unless delivery
    /// failed under [`DeliveryPolicy::CarryOver`].
    pub async fn flush(&mut self, now: Instant, total: u64, wall: DateTime<Utc>) -> FlushOutcome {
        if total < self.baseline {
            warn!(
                "Running total went backwards ({} < {}). Re-basing the report counter.",
                total, self.baseline
            );
            self.baseline = total;
        }

        let delta = total - self.baseline;
        let report = Report {
            timestamp: self.config.clock.label(wall),
            count: delta,
            location: self.config.location.clone(),
        };

        info!(
            "[REPORT] Sending to {}: time={} count={} location={}",
            self.sink.name(),
            report.timestamp,
            report.count,
            report.location
        );

        let result = self.sink.deliver(&report).await;
        self.last_flush = now;

        match result {
            Ok(()) => {
                self.baseline = total;
                self.stats.reports_delivered += 1;
                self.stats.vehicles_reported += delta;
                info!("[REPORT] Delivered");
                FlushOutcome::Delivered(report)
            }
            Err(e) => {
                self.stats.reports_failed += 1;
                match self.config.delivery_policy {
                    DeliveryPolicy::Discard => {
                        warn!(
                            "[REPORT] Delivery failed, discarding {} vehicles: {}",
                            delta, e
                        );
                        self.baseline = total;
                        self.stats.vehicles_dropped += delta;
                        FlushOutcome::Dropped {
                            report,
                            error: e.to_string(),
                        }
                    }
                    DeliveryPolicy::CarryOver => {
                        warn!(
                            "[REPORT] Delivery failed, carrying {} vehicles into the next report: {}",
                            delta, e
                        );
                        FlushOutcome::CarriedOver {
                            report,
                            error: e.to_string(),
                        }
                    }
                }
            }
        }
    }

    /// Runs the scheduler as an independent timer task until `shutdown`
    /// flips to true (or its sender is dropped), then flushes any pending
    /// count once more.
    pub async fn run(
        mut self,
        total: TotalHandle,
        mut shutdown: watch::Receiver<bool>,
    ) -> SchedulerStats {
        let start = tokio::time::Instant::now();
        self.reset_timer(start.into_std());

        let mut ticker = tokio::time::interval_at(start + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                tick = ticker.tick() => {
                    self.poll(tick.into_std(), total.get()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let total_now = total.get();
        if self.pending(total_now) > 0 {
            info!("[REPORT] Final flush before shutdown");
            self.flush(Instant::now(), total_now, Utc::now()).await;
        }

        self.stats
    }
}

// =============================================================================
// Tests
// =============================================================================
