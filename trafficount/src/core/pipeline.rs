//! Counting Pipeline
//!
//! Drives the counting engine from a frame source on a blocking worker while
//! the report scheduler runs as its own timer task, reading the running total
//! through a snapshot handle. Report timing therefore doesn't depend on how
//! long individual frames take to process.

use tokio::sync::watch;
use tracing::info;

use crate::core::counting::CountingEngine;
use crate::core::detection::FrameSource;
use crate::core::reporting::{ReportScheduler, ReportSink, SchedulerStats};
use crate::core::{CoreError, CoreResult, FrameIndex};

/// Totals reported when the pipeline finishes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub frames: FrameIndex,
    pub total_counted: u64,
    /// Identities still tracked at the end
    pub active_tracks: usize,
    pub scheduler: SchedulerStats,
}

/// Runs the pipeline until the frame source is exhausted.
///
/// A source error is fatal: the scheduler still gets its final flush, then
/// the error is returned.
pub async fn run_pipeline<F, S>(
    source: F,
    engine: CountingEngine,
    scheduler: ReportScheduler<S>,
) -> CoreResult<PipelineSummary>
where
    F: FrameSource + 'static,
    S: ReportSink + 'static,
{
    let total = engine.total_handle();
    let (stop_tx, stop_rx) = watch::channel(false);
    let reporter = tokio::spawn(scheduler.run(total, stop_rx));

    let frames = tokio::task::spawn_blocking(move || process_frames(source, engine)).await;

    let _ = stop_tx.send(true);
    let scheduler_stats = reporter
        .await
        .map_err(|e| CoreError::Internal(format!("Report scheduler task failed: {}", e)))?;

    let (frame_count, total_counted, active_tracks) = frames
        .map_err(|e| CoreError::Internal(format!("Frame loop task failed: {}", e)))??;

    let summary = PipelineSummary {
        frames: frame_count,
        total_counted,
        active_tracks,
        scheduler: scheduler_stats,
    };
    info!(
        "Pipeline finished: {} frames, {} unique vehicles, {} reports delivered",
        summary.frames, summary.total_counted, summary.scheduler.reports_delivered
    );
    Ok(summary)
}

fn process_frames<F: FrameSource>(
    mut source: F,
    mut engine: CountingEngine,
) -> CoreResult<(FrameIndex, u64, usize)> {
    while let Some(observations) = source.next_frame()? {
        engine.update(&observations);
    }
    Ok((
        engine.frames_processed(),
        engine.total(),
        engine.tracked_count(),
    ))
}
