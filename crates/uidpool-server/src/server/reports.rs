//! Consumes background maintenance reports and turns them into logs and
//! metrics.

use core::time::Duration;
use crate::server::telemetry::{
    increment_lock_contended, increment_maintain_errors, record_maintain_duration, record_refill,
};
use tokio::sync::mpsc;
use uidpool::{MaintainOutcome, MaintainReport};

/// Drains `reports` until the background maintainer drops its sender.
pub async fn drain_reports(mut reports: mpsc::Receiver<MaintainReport>) {
    while let Some(report) = reports.recv().await {
        record_report(&report);
    }
    tracing::debug!("maintenance report channel closed");
}

fn record_report(report: &MaintainReport) {
    record_maintain_duration(report.elapsed.as_secs_f64() * 1000.0);

    match &report.outcome {
        Ok(MaintainOutcome::Skipped { .. }) => {}
        Ok(MaintainOutcome::Refilled { size, pushed }) => {
            record_refill(*pushed as u64);
            tracing::info!(
                iteration = report.iteration,
                size,
                pushed,
                elapsed_ms = millis(report.elapsed),
                "pool refilled"
            );
        }
        Err(e) if e.is_lock_contended() => {
            increment_lock_contended();
            tracing::debug!(iteration = report.iteration, "refill already in progress elsewhere");
        }
        Err(e) => {
            increment_maintain_errors();
            tracing::error!(iteration = report.iteration, "maintenance failed: {e}");
        }
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
