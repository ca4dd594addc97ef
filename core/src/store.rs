use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::ack::Acknowledgment;
use crate::metrics::{MetricsSnapshot, Profile};

/// Opaque storage failure. The domain layer never inspects it; the API layer
/// logs it and answers with a generic internal error.
#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StoreError(pub Box<dyn std::error::Error + Send + Sync>);

impl StoreError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        StoreError(err.into())
    }
}

/// Read access to user profiles. Profiles are owned by the profile-edit
/// collaborator; this system only reads them.
pub trait ProfileReader: Send + Sync {
    fn profile(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<Profile>, StoreError>> + Send;

    /// Every user whose onboarding is complete, for the daily batch.
    fn onboarded_users(&self) -> impl Future<Output = Result<Vec<Uuid>, StoreError>> + Send;
}

/// Append-only snapshot storage. Rows are inserted, never updated or deleted.
pub trait MetricsStore: Send + Sync {
    /// Newest snapshot for the given user and calendar-day bucket.
    fn find_for_day(
        &self,
        user_id: Uuid,
        day: NaiveDate,
    ) -> impl Future<Output = Result<Option<MetricsSnapshot>, StoreError>> + Send;

    fn insert(
        &self,
        snapshot: &MetricsSnapshot,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Insert-only acknowledgment storage with an idempotent insert path.
pub trait AckStore: Send + Sync {
    /// Insert `candidate`, or return the already-stored row for the same
    /// (user_id, metrics_computed_at, formula_version) triple. Concurrent
    /// duplicate inserts must both observe the single winning row — never a
    /// conflict error.
    fn insert_or_fetch(
        &self,
        candidate: &Acknowledgment,
    ) -> impl Future<Output = Result<Acknowledgment, StoreError>> + Send;

    fn find(
        &self,
        user_id: Uuid,
        metrics_computed_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<Acknowledgment>, StoreError>> + Send;

    fn exists(
        &self,
        user_id: Uuid,
        metrics_computed_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory store used by the domain tests. Postgres-backed
    //! implementations live in the API crate.

    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, NaiveDate, Utc};
    use uuid::Uuid;

    use super::{AckStore, MetricsStore, ProfileReader, StoreError};
    use crate::ack::Acknowledgment;
    use crate::metrics::{MetricsSnapshot, Profile};

    #[derive(Clone, Default)]
    pub(crate) struct MemoryStore {
        inner: Arc<Mutex<Inner>>,
    }

    #[derive(Default)]
    struct Inner {
        profiles: HashMap<Uuid, Profile>,
        snapshots: Vec<MetricsSnapshot>,
        acks: Vec<Acknowledgment>,
        failing_users: HashSet<Uuid>,
    }

    impl MemoryStore {
        pub fn put_profile(&self, profile: Profile) {
            let mut inner = self.inner.lock().unwrap();
            inner.profiles.insert(profile.user_id, profile);
        }

        /// Make snapshot inserts fail for this user, to exercise fault isolation.
        pub fn fail_inserts_for(&self, user_id: Uuid) {
            self.inner.lock().unwrap().failing_users.insert(user_id);
        }

        pub fn snapshot_count(&self) -> usize {
            self.inner.lock().unwrap().snapshots.len()
        }

        pub fn ack_count(&self) -> usize {
            self.inner.lock().unwrap().acks.len()
        }
    }

    impl ProfileReader for MemoryStore {
        async fn profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
            Ok(self.inner.lock().unwrap().profiles.get(&user_id).cloned())
        }

        async fn onboarded_users(&self) -> Result<Vec<Uuid>, StoreError> {
            let inner = self.inner.lock().unwrap();
            let mut users: Vec<Uuid> = inner
                .profiles
                .values()
                .filter(|p| p.onboarding_completed)
                .map(|p| p.user_id)
                .collect();
            users.sort();
            Ok(users)
        }
    }

    impl MetricsStore for MemoryStore {
        async fn find_for_day(
            &self,
            user_id: Uuid,
            day: NaiveDate,
        ) -> Result<Option<MetricsSnapshot>, StoreError> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .snapshots
                .iter()
                .filter(|s| s.user_id == user_id && s.computed_on == day)
                .max_by_key(|s| (s.computed_at, s.id))
                .cloned())
        }

        async fn insert(&self, snapshot: &MetricsSnapshot) -> Result<(), StoreError> {
            let mut inner = self.inner.lock().unwrap();
            if inner.failing_users.contains(&snapshot.user_id) {
                return Err(StoreError::new("injected insert failure"));
            }
            inner.snapshots.push(snapshot.clone());
            Ok(())
        }
    }

    impl AckStore for MemoryStore {
        async fn insert_or_fetch(
            &self,
            candidate: &Acknowledgment,
        ) -> Result<Acknowledgment, StoreError> {
            let mut inner = self.inner.lock().unwrap();
            if let Some(existing) = inner.acks.iter().find(|a| {
                a.user_id == candidate.user_id
                    && a.metrics_computed_at == candidate.metrics_computed_at
                    && a.formula_version == candidate.formula_version
            }) {
                return Ok(existing.clone());
            }
            inner.acks.push(candidate.clone());
            Ok(candidate.clone())
        }

        async fn find(
            &self,
            user_id: Uuid,
            metrics_computed_at: DateTime<Utc>,
        ) -> Result<Option<Acknowledgment>, StoreError> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .acks
                .iter()
                .find(|a| a.user_id == user_id && a.metrics_computed_at == metrics_computed_at)
                .cloned())
        }

        async fn exists(
            &self,
            user_id: Uuid,
            metrics_computed_at: DateTime<Utc>,
        ) -> Result<bool, StoreError> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .acks
                .iter()
                .any(|a| a.user_id == user_id && a.metrics_computed_at == metrics_computed_at))
        }
    }
}
