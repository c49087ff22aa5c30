//! Periodic maintenance, independent of consumer activity.
//!
//! [`BackgroundMaintainer`] runs [`Maintainer::maintain`] on a fixed interval
//! so refills usually land before any consumer observes an empty pool. The
//! loop starts immediately, never stops on error, and reports every iteration
//! on a bounded channel instead of swallowing failures.

use crate::{IdSource, MaintainOutcome, Maintainer, PoolStore, Result};
use core::time::Duration;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;

/// The result of one background maintenance iteration.
#[derive(Debug)]
pub struct MaintainReport {
    /// 1-based iteration counter.
    pub iteration: u64,
    /// What `maintain` returned.
    pub outcome: Result<MaintainOutcome>,
    /// Wall time spent in `maintain`, including the identifier source.
    pub elapsed: Duration,
}

/// Handle to a running background maintenance task.
pub struct BackgroundMaintainer {
    shutdown_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackgroundMaintainer {
    /// Spawns the maintenance loop on the current Tokio runtime.
    ///
    /// The interval and report channel capacity come from the maintainer's
    /// [`PoolConfig`](crate::PoolConfig). Reports that do not fit in the
    /// channel, or that nobody is listening for, are dropped; the loop keeps
    /// running either way.
    pub fn spawn<S, G>(maintainer: Maintainer<S, G>) -> (Self, mpsc::Receiver<MaintainReport>)
    where
        S: PoolStore,
        G: IdSource,
    {
        let (tx, rx) = mpsc::channel(maintainer.config().report_capacity());
        let shutdown_token = CancellationToken::new();
        let interval = maintainer.config().maintain_interval();
        let handle = tokio::spawn(maintain_loop(
            maintainer,
            interval,
            tx,
            shutdown_token.clone(),
        ));

        (
            Self {
                shutdown_token,
                handle,
            },
            rx,
        )
    }

    /// Returns `true` once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the loop and waits for it to exit.
    ///
    /// An in-flight `maintain` call is allowed to finish so the refill lock is
    /// released rather than left to expire.
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        if let Err(_e) = self.handle.await {
            #[cfg(feature = "tracing")]
            tracing::error!("background maintainer task failed: {_e}");
        }
    }
}

async fn maintain_loop<S, G>(
    maintainer: Maintainer<S, G>,
    interval: Duration,
    reports: mpsc::Sender<MaintainReport>,
    shutdown_token: CancellationToken,
) where
    S: PoolStore,
    G: IdSource,
{
    #[cfg(feature = "tracing")]
    tracing::debug!(
        pool = maintainer.config().pool_key(),
        interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        "background maintainer started"
    );

    let mut iteration = 0_u64;
    while !shutdown_token.is_cancelled() {
        iteration += 1;
        let started = Instant::now();
        let outcome = maintainer.maintain().await;
        let elapsed = started.elapsed();

        #[cfg(feature = "tracing")]
        log_outcome(maintainer.config().pool_key(), &outcome);

        let report = MaintainReport {
            iteration,
            outcome,
            elapsed,
        };
        match reports.try_send(report) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(iteration, "maintenance report channel full, dropping report");
            }
        }

        tokio::select! {
            () = shutdown_token.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        pool = maintainer.config().pool_key(),
        iterations = iteration,
        "background maintainer stopped"
    );
}

#[cfg(feature = "tracing")]
fn log_outcome(pool: &str, outcome: &Result<MaintainOutcome>) {
    match outcome {
        Ok(MaintainOutcome::Skipped { size }) => tracing::trace!(pool, size, "pool above threshold"),
        Ok(MaintainOutcome::Refilled { size, pushed }) => {
            tracing::info!(pool, size, pushed, "pool refilled");
        }
        Err(e) if e.is_lock_contended() => tracing::debug!(pool, "refill already in flight"),
        Err(e) => tracing::warn!(pool, error = %e, "background maintenance failed"),
    }
}
