use uuid::Uuid;

use crate::ack::AcknowledgmentTracker;
use crate::error::CoreError;
use crate::service::MetricsService;
use crate::store::{AckStore, MetricsStore, ProfileReader};

/// Authoritative precondition check for plan generation: the current-day
/// snapshot must be acknowledged before a plan may be generated.
///
/// This runs inside the plan-generation entry point itself, so protocol-level
/// callers that bypass any presentation layer still hit it.
pub struct PlanGenerationGate<'a, P, M, A> {
    metrics: &'a MetricsService<P, M>,
    acks: &'a AcknowledgmentTracker<A>,
}

impl<'a, P, M, A> PlanGenerationGate<'a, P, M, A>
where
    P: ProfileReader,
    M: MetricsStore,
    A: AckStore,
{
    pub fn new(metrics: &'a MetricsService<P, M>, acks: &'a AcknowledgmentTracker<A>) -> Self {
        Self { metrics, acks }
    }

    pub async fn can_generate(&self, user_id: Uuid) -> Result<(), CoreError> {
        let snapshot = match self.metrics.get_today(user_id).await {
            Ok(snapshot) => snapshot,
            // Bootstrap: nothing computed yet means nothing to acknowledge.
            Err(CoreError::NotFound { .. }) => return Ok(()),
            Err(err) => return Err(err),
        };

        if self
            .acks
            .is_acknowledged(user_id, snapshot.computed_at)
            .await?
        {
            Ok(())
        } else {
            Err(CoreError::Gate(
                "metrics must be acknowledged before plan generation".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::PlanGenerationGate;
    use crate::ack::AcknowledgmentTracker;
    use crate::error::CoreError;
    use crate::metrics::{ActivityLevel, Gender, Profile};
    use crate::service::MetricsService;
    use crate::store::memory::MemoryStore;

    fn complete_profile(user_id: Uuid) -> Profile {
        Profile {
            user_id,
            weight_kg: Some(82.5),
            height_cm: Some(180.0),
            age_years: Some(41),
            gender: Some(Gender::Female),
            activity_level: Some(ActivityLevel::LightlyActive),
            goal_weight_kg: Some(75.0),
            weekly_goal_kg: Some(0.5),
            onboarding_completed: true,
        }
    }

    #[tokio::test]
    async fn unacknowledged_snapshot_blocks_generation() {
        let store = MemoryStore::default();
        let user_id = Uuid::now_v7();
        store.put_profile(complete_profile(user_id));

        let service = MetricsService::new(store.clone(), store.clone());
        let tracker = AcknowledgmentTracker::new(store.clone());
        let gate = PlanGenerationGate::new(&service, &tracker);

        let snapshot = service.compute_and_store(user_id, false).await.unwrap();

        let err = gate.can_generate(user_id).await.unwrap_err();
        assert!(matches!(err, CoreError::Gate(_)));

        tracker
            .acknowledge(user_id, snapshot.formula_version, snapshot.computed_at)
            .await
            .unwrap();

        gate.can_generate(user_id).await.unwrap();
    }

    #[tokio::test]
    async fn missing_snapshot_allows_bootstrap_generation() {
        let store = MemoryStore::default();
        let service = MetricsService::new(store.clone(), store.clone());
        let tracker = AcknowledgmentTracker::new(store);
        let gate = PlanGenerationGate::new(&service, &tracker);

        gate.can_generate(Uuid::now_v7()).await.unwrap();
    }

    #[tokio::test]
    async fn acknowledgment_of_a_stale_snapshot_does_not_open_the_gate() {
        let store = MemoryStore::default();
        let user_id = Uuid::now_v7();
        store.put_profile(complete_profile(user_id));

        let service = MetricsService::new(store.clone(), store.clone());
        let tracker = AcknowledgmentTracker::new(store.clone());
        let gate = PlanGenerationGate::new(&service, &tracker);

        let first = service.compute_and_store(user_id, false).await.unwrap();
        tracker
            .acknowledge(user_id, first.formula_version, first.computed_at)
            .await
            .unwrap();

        // A forced recompute produces a newer snapshot the user has not seen.
        let second = service.compute_and_store(user_id, true).await.unwrap();
        assert_ne!(first.computed_at, second.computed_at);

        let err = gate.can_generate(user_id).await.unwrap_err();
        assert!(matches!(err, CoreError::Gate(_)));
    }
}
