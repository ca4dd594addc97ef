use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::error::CoreError;
use crate::service::MetricsService;
use crate::store::{MetricsStore, ProfileReader};

/// Aggregate outcome of one batch run, for operational monitoring.
/// Every onboarded user lands in exactly one counter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub success_count: u64,
    pub skipped_count: u64,
    pub error_count: u64,
}

/// Daily batch recompute over all onboarded users with per-user fault
/// isolation: one user's failure is logged and counted, never allowed to
/// abort the rest of the run. Idempotent against same-day re-runs — the
/// underlying service returns existing snapshots instead of duplicating them.
pub struct DailyRecompute<P, M> {
    profiles: P,
    service: MetricsService<P, M>,
}

impl<P, M> DailyRecompute<P, M>
where
    P: ProfileReader + Clone,
    M: MetricsStore,
{
    pub fn new(profiles: P, metrics: M) -> Self {
        Self {
            profiles: profiles.clone(),
            service: MetricsService::new(profiles, metrics),
        }
    }

    pub async fn run(&self) -> Result<RunReport, CoreError> {
        let users = self.profiles.onboarded_users().await?;
        let mut report = RunReport::default();

        for user_id in users {
            match self.recompute_one(user_id).await {
                Ok(Outcome::Computed) => report.success_count += 1,
                Ok(Outcome::Skipped) => report.skipped_count += 1,
                Err(err) => {
                    tracing::warn!(%user_id, error = %err, "daily recompute failed for user");
                    report.error_count += 1;
                }
            }
        }

        Ok(report)
    }

    async fn recompute_one(&self, user_id: Uuid) -> Result<Outcome, CoreError> {
        let Some(profile) = self.profiles.profile(user_id).await? else {
            return Ok(Outcome::Skipped);
        };
        if profile.body_inputs().is_none() {
            return Ok(Outcome::Skipped);
        }
        self.service.compute_and_store(user_id, false).await?;
        Ok(Outcome::Computed)
    }
}

enum Outcome {
    Computed,
    Skipped,
}

/// Trigger strategy for the batch. Fixed-interval today; a timezone-aware
/// strategy can replace it without touching the computation side.
pub trait RecomputeSchedule: Send + Sync {
    /// Delay from `now` until the next run should start.
    fn delay_until_next_run(&self, now: DateTime<Utc>) -> Duration;
}

/// Runs at a fixed interval with a random jitter so multiple instances do not
/// hammer the database at the same instant.
pub struct FixedIntervalSchedule {
    every: Duration,
    max_jitter: Duration,
}

impl FixedIntervalSchedule {
    pub fn new(every: Duration) -> Self {
        // Jitter is 1/20th of the interval, capped at five minutes.
        let max_jitter = (every / 20).min(Duration::from_secs(300));
        Self { every, max_jitter }
    }
}

impl RecomputeSchedule for FixedIntervalSchedule {
    fn delay_until_next_run(&self, _now: DateTime<Utc>) -> Duration {
        let jitter_secs = if self.max_jitter.is_zero() {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.max_jitter.as_secs())
        };
        self.every + Duration::from_secs(jitter_secs)
    }
}
