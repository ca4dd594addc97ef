use chrono::Utc;
use uuid::Uuid;

use crate::error::CoreError;
use crate::metrics::{self, MetricsSnapshot};
use crate::store::{MetricsStore, ProfileReader};

/// Computes and persists immutable daily metrics snapshots. Idempotent per
/// calendar day: recomputing without `force_recompute` returns the existing
/// row untouched instead of duplicating it.
pub struct MetricsService<P, M> {
    profiles: P,
    metrics: M,
}

impl<P: ProfileReader, M: MetricsStore> MetricsService<P, M> {
    pub fn new(profiles: P, metrics: M) -> Self {
        Self { profiles, metrics }
    }

    /// Return today's snapshot, computing and storing one first if needed.
    ///
    /// With `force_recompute` a fresh row is appended even when one already
    /// exists for today; prior rows are never overwritten.
    pub async fn compute_and_store(
        &self,
        user_id: Uuid,
        force_recompute: bool,
    ) -> Result<MetricsSnapshot, CoreError> {
        let now = Utc::now();
        let today = now.date_naive();

        if !force_recompute {
            if let Some(existing) = self.metrics.find_for_day(user_id, today).await? {
                return Ok(existing);
            }
        }

        let profile = self
            .profiles
            .profile(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("profile for user {user_id}")))?;

        let inputs = profile.body_inputs().ok_or_else(|| CoreError::Validation {
            field: None,
            message: "profile is missing weight, height, age, gender, or activity level"
                .to_string(),
        })?;

        let snapshot = metrics::compute(user_id, &inputs, now)?;
        self.metrics.insert(&snapshot).await?;
        Ok(snapshot)
    }

    /// Most recent snapshot for the current calendar day.
    pub async fn get_today(&self, user_id: Uuid) -> Result<MetricsSnapshot, CoreError> {
        self.metrics
            .find_for_day(user_id, Utc::now().date_naive())
            .await?
            .ok_or_else(|| CoreError::not_found("metrics snapshot for today"))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::MetricsService;
    use crate::error::CoreError;
    use crate::metrics::{ActivityLevel, Gender, Profile};
    use crate::store::memory::MemoryStore;

    fn complete_profile(user_id: Uuid) -> Profile {
        Profile {
            user_id,
            weight_kg: Some(70.0),
            height_cm: Some(175.0),
            age_years: Some(30),
            gender: Some(Gender::Male),
            activity_level: Some(ActivityLevel::ModeratelyActive),
            goal_weight_kg: Some(65.0),
            weekly_goal_kg: Some(0.5),
            onboarding_completed: true,
        }
    }

    #[tokio::test]
    async fn same_day_recompute_returns_existing_snapshot() {
        let store = MemoryStore::default();
        let user_id = Uuid::now_v7();
        store.put_profile(complete_profile(user_id));
        let service = MetricsService::new(store.clone(), store.clone());

        let first = service.compute_and_store(user_id, false).await.unwrap();
        let second = service.compute_and_store(user_id, false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.snapshot_count(), 1);
    }

    #[tokio::test]
    async fn force_recompute_appends_a_new_row() {
        let store = MemoryStore::default();
        let user_id = Uuid::now_v7();
        store.put_profile(complete_profile(user_id));
        let service = MetricsService::new(store.clone(), store.clone());

        let first = service.compute_and_store(user_id, false).await.unwrap();
        let second = service.compute_and_store(user_id, true).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.snapshot_count(), 2);

        // get_today returns the newest of the two
        let today = service.get_today(user_id).await.unwrap();
        assert_eq!(today.id, second.id);
    }

    #[tokio::test]
    async fn incomplete_profile_fails_validation() {
        let store = MemoryStore::default();
        let user_id = Uuid::now_v7();
        let mut profile = complete_profile(user_id);
        profile.weight_kg = None;
        store.put_profile(profile);
        let service = MetricsService::new(store.clone(), store);

        let err = service.compute_and_store(user_id, false).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[tokio::test]
    async fn out_of_range_inputs_fail_validation() {
        let store = MemoryStore::default();
        let user_id = Uuid::now_v7();
        let mut profile = complete_profile(user_id);
        profile.height_cm = Some(400.0);
        store.put_profile(profile);
        let service = MetricsService::new(store.clone(), store);

        let err = service.compute_and_store(user_id, false).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation { field: Some(ref f), .. } if f == "height_cm"
        ));
    }

    #[tokio::test]
    async fn get_today_without_snapshot_is_not_found() {
        let store = MemoryStore::default();
        let service = MetricsService::new(store.clone(), store);

        let err = service.get_today(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
