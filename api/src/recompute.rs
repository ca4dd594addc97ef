//! Background loop for the daily metrics recompute batch.
//!
//! The trigger mechanism is a strategy: the shipped `FixedIntervalSchedule`
//! fires once per interval for everyone, which ignores per-user timezones. A
//! timezone-aware schedule can replace it without touching the batch itself.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;

use vitalis_core::scheduler::{DailyRecompute, FixedIntervalSchedule, RecomputeSchedule};

use crate::storage::{PgMetrics, PgProfiles};

const DEFAULT_INTERVAL_SECS: u64 = 86_400;

/// Interval from `VITALIS_RECOMPUTE_INTERVAL_SECS`, defaulting to daily.
pub fn schedule_from_env() -> FixedIntervalSchedule {
    let secs = std::env::var("VITALIS_RECOMPUTE_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_INTERVAL_SECS);
    FixedIntervalSchedule::new(Duration::from_secs(secs))
}

pub fn spawn(pool: PgPool, schedule: impl RecomputeSchedule + 'static) {
    tokio::spawn(async move {
        let job = DailyRecompute::new(PgProfiles::new(pool.clone()), PgMetrics::new(pool));

        loop {
            let delay = schedule.delay_until_next_run(Utc::now());
            tracing::debug!(delay_secs = delay.as_secs(), "next recompute scheduled");
            tokio::time::sleep(delay).await;

            match job.run().await {
                Ok(report) => tracing::info!(
                    success_count = report.success_count,
                    skipped_count = report.skipped_count,
                    error_count = report.error_count,
                    "daily recompute finished"
                ),
                Err(err) => tracing::error!(error = %err, "daily recompute run failed"),
            }
        }
    });
}
