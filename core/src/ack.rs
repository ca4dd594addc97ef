use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::CoreError;
use crate::store::AckStore;

/// A user's acknowledgment of one specific metrics snapshot. Insert-only:
/// created once, read many times, never updated or deleted. Unique on
/// (user_id, metrics_computed_at, formula_version).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Acknowledgment {
    pub id: Uuid,
    pub user_id: Uuid,
    /// `computed_at` of the snapshot being acknowledged
    pub metrics_computed_at: DateTime<Utc>,
    /// Formula version the acknowledged numbers were produced with
    pub formula_version: i32,
    pub acknowledged_at: DateTime<Utc>,
}

/// Records acknowledgments idempotently: a retry (or a concurrent duplicate
/// from a flaky client) returns the original row unchanged.
pub struct AcknowledgmentTracker<A> {
    store: A,
}

impl<A: AckStore> AcknowledgmentTracker<A> {
    pub fn new(store: A) -> Self {
        Self { store }
    }

    /// Select-or-insert. If the triple is already acknowledged, the stored row
    /// comes back as success; a race between identical requests resolves to
    /// the single winning row at the storage layer.
    pub async fn acknowledge(
        &self,
        user_id: Uuid,
        formula_version: i32,
        metrics_computed_at: DateTime<Utc>,
    ) -> Result<Acknowledgment, CoreError> {
        let candidate = Acknowledgment {
            id: Uuid::now_v7(),
            user_id,
            metrics_computed_at,
            formula_version,
            acknowledged_at: Utc::now(),
        };
        Ok(self.store.insert_or_fetch(&candidate).await?)
    }

    /// The stored acknowledgment for a snapshot, if any.
    pub async fn acknowledgment_for(
        &self,
        user_id: Uuid,
        metrics_computed_at: DateTime<Utc>,
    ) -> Result<Option<Acknowledgment>, CoreError> {
        Ok(self.store.find(user_id, metrics_computed_at).await?)
    }

    pub async fn is_acknowledged(
        &self,
        user_id: Uuid,
        metrics_computed_at: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        Ok(self.store.exists(user_id, metrics_computed_at).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::AcknowledgmentTracker;
    use crate::metrics::FORMULA_VERSION;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn acknowledge_is_idempotent() {
        let store = MemoryStore::default();
        let tracker = AcknowledgmentTracker::new(store.clone());
        let user_id = Uuid::now_v7();
        let computed_at = Utc::now();

        let first = tracker
            .acknowledge(user_id, FORMULA_VERSION, computed_at)
            .await
            .unwrap();
        let second = tracker
            .acknowledge(user_id, FORMULA_VERSION, computed_at)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.ack_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_duplicates_observe_the_same_row() {
        let store = MemoryStore::default();
        let user_id = Uuid::now_v7();
        let computed_at = Utc::now();

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                AcknowledgmentTracker::new(store)
                    .acknowledge(user_id, FORMULA_VERSION, computed_at)
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                AcknowledgmentTracker::new(store)
                    .acknowledge(user_id, FORMULA_VERSION, computed_at)
                    .await
            })
        };

        let first = a.await.unwrap().unwrap();
        let second = b.await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(store.ack_count(), 1);
    }

    #[tokio::test]
    async fn is_acknowledged_reports_existence() {
        let store = MemoryStore::default();
        let tracker = AcknowledgmentTracker::new(store);
        let user_id = Uuid::now_v7();
        let computed_at = Utc::now();

        assert!(!tracker.is_acknowledged(user_id, computed_at).await.unwrap());

        tracker
            .acknowledge(user_id, FORMULA_VERSION, computed_at)
            .await
            .unwrap();

        assert!(tracker.is_acknowledged(user_id, computed_at).await.unwrap());
    }
}
