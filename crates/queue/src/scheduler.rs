//! Claim-and-publish scheduler.
//!
//! Periodically drains due notifications from the store to the queue, plus
//! a daily retention sweep over terminal rows. Each tick is one transaction,
//! so cancellation between ticks never leaks half-processed rows. Rows stuck
//! in `in_process` (a worker crash mid-delivery) are not reaped here — that
//! is an operational concern, not a scheduler guarantee.

use std::sync::Arc;
use std::time::Duration;

use notifier_core::NotifyService;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between claim-and-publish ticks.
    pub tick_interval: Duration,
    /// Maximum rows claimed per tick.
    pub batch_limit: u64,
    /// Interval between retention sweeps (default: daily).
    pub cleanup_interval: Duration,
    /// Terminal rows older than this many days are deleted.
    pub retention_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            batch_limit: 50,
            cleanup_interval: Duration::from_secs(86_400),
            retention_days: 30,
        }
    }
}

/// Run the scheduler until the token is cancelled.
///
/// Stops between ticks; an in-flight tick always finishes its transaction
/// first, so shutdown either commits the whole batch or rolls it back.
pub async fn run_scheduler(
    config: SchedulerConfig,
    service: Arc<NotifyService>,
    shutdown: CancellationToken,
) {
    let mut tick = tokio::time::interval(config.tick_interval);
    let mut cleanup = tokio::time::interval(config.cleanup_interval);

    info!(
        tick_interval_secs = config.tick_interval.as_secs(),
        batch_limit = config.batch_limit,
        "scheduler started"
    );

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                info!("scheduler stopping");
                break;
            }
            _ = tick.tick() => {
                match service.process_due(config.batch_limit).await {
                    Ok(stats) if stats.processed + stats.failed > 0 => {
                        info!(
                            processed = stats.processed,
                            failed = stats.failed,
                            duration_ms = stats.duration.as_millis() as u64,
                            "dispatched due notifications"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "scheduler tick failed");
                    }
                }
            }
            _ = cleanup.tick() => {
                match service.cleanup_old(config.retention_days).await {
                    Ok(0) => {}
                    Ok(count) => {
                        info!(count, retention_days = config.retention_days, "cleaned up old notifications");
                    }
                    Err(e) => {
                        error!(error = %e, "retention sweep failed");
                    }
                }
            }
        }
    }
}
