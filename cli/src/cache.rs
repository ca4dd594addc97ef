//! Client-side plan cache: TTL reads, single-flight refresh, and
//! fallback-to-last-known-good when a refresh fails.
//!
//! State machine: `Empty → Valid → Stale → Refreshing → {Valid | ErrorWithFallback}`.
//! The held entry is replaced wholesale by the one owning refresh path, never
//! partially mutated, and never touched by external code.

use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use vitalis_core::plan::{PlanDiff, PlanTargets};

use crate::api::ClientError;
use crate::store::PlanStore;

pub const DEFAULT_TTL_SECONDS: i64 = 3600;

/// The cached plan. Owned exclusively by the cache instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanCacheEntry {
    pub targets: PlanTargets,
    /// Targets from the refresh before this one, kept for diffing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_targets: Option<PlanTargets>,
    pub fetched_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

impl PlanCacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.fetched_at).num_seconds() < self.ttl_seconds
    }
}

/// What one `fetch` call hands back.
#[derive(Debug, Clone)]
pub struct PlanReadout {
    pub entry: PlanCacheEntry,
    /// Diff against the previous plan, present only on a refresh that replaced one.
    pub change: Option<PlanDiff>,
    /// Set when a refresh failed and the last saved plan is shown instead.
    pub degraded: Option<String>,
    /// Whether this readout was served without a remote call.
    pub from_cache: bool,
}

/// The remote plan-generation call the cache wraps.
pub trait PlanFetch: Send + Sync + 'static {
    fn fetch_plan(
        &self,
        force_recompute: bool,
    ) -> impl Future<Output = Result<PlanTargets, ClientError>> + Send;
}

impl<T: PlanFetch> PlanFetch for Arc<T> {
    async fn fetch_plan(&self, force_recompute: bool) -> Result<PlanTargets, ClientError> {
        (**self).fetch_plan(force_recompute).await
    }
}

/// Optional notification sink for significant plan changes. Fired from the
/// refresh path without being awaited; implementations must not block.
pub trait ChangeSink: Send + Sync {
    fn plan_changed(&self, diff: PlanDiff);
}

/// Terminal failure of a refresh, cloneable so every single-flight waiter
/// receives it. Only surfaced when there is no previous entry to fall back on.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FetchFailure {
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
}

impl From<&ClientError> for FetchFailure {
    fn from(err: &ClientError) -> Self {
        match err {
            ClientError::Api {
                status,
                code,
                message,
            } => FetchFailure {
                status: Some(*status),
                code: Some(code.clone()),
                message: message.clone(),
            },
            other => FetchFailure {
                status: None,
                code: None,
                message: other.to_string(),
            },
        }
    }
}

type RefreshResult = Result<PlanReadout, FetchFailure>;

struct CacheState {
    entry: Option<PlanCacheEntry>,
    /// Degraded-mode reason from the last failed refresh; cleared on success.
    last_error: Option<String>,
}

struct Shared<F, S> {
    fetcher: F,
    store: S,
    sink: Option<Arc<dyn ChangeSink>>,
    state: Mutex<CacheState>,
    /// Receiver for the one outstanding refresh, if any. Guarded by an async
    /// mutex so joiners can await it without blocking the runtime.
    in_flight: tokio::sync::Mutex<Option<watch::Receiver<Option<RefreshResult>>>>,
    ttl_seconds: i64,
}

/// Single-flight, TTL-based cache around the plan-generation call.
pub struct PlanCache<F, S> {
    shared: Arc<Shared<F, S>>,
}

impl<F, S> Clone for PlanCache<F, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: PlanFetch, S: PlanStore> PlanCache<F, S> {
    /// Build a cache over `fetcher`, hydrating the held entry from `store` so
    /// a restarted process can still serve last-known-good data. The store is
    /// injected per instance; independent caches never share state.
    pub async fn new(fetcher: F, store: S) -> Self {
        Self::build(fetcher, store, DEFAULT_TTL_SECONDS, None).await
    }

    pub async fn with_ttl(fetcher: F, store: S, ttl_seconds: i64) -> Self {
        Self::build(fetcher, store, ttl_seconds, None).await
    }

    /// Cache that notifies `sink` whenever a refresh changes the plan
    /// significantly.
    pub async fn with_sink(
        fetcher: F,
        store: S,
        ttl_seconds: i64,
        sink: Arc<dyn ChangeSink>,
    ) -> Self {
        Self::build(fetcher, store, ttl_seconds, Some(sink)).await
    }

    async fn build(
        fetcher: F,
        store: S,
        ttl_seconds: i64,
        sink: Option<Arc<dyn ChangeSink>>,
    ) -> Self {
        let entry = match store.load().await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load persisted plan cache");
                None
            }
        };

        Self {
            shared: Arc::new(Shared {
                fetcher,
                store,
                sink,
                state: Mutex::new(CacheState {
                    entry,
                    last_error: None,
                }),
                in_flight: tokio::sync::Mutex::new(None),
                ttl_seconds,
            }),
        }
    }

    /// Current plan, refreshing when forced or past TTL.
    ///
    /// A fresh entry is returned synchronously with zero remote calls.
    /// Concurrent refreshes collapse into one shared in-flight call; dropping
    /// an individual waiter only drops its receiver, the shared call keeps
    /// running for the rest.
    pub async fn fetch(&self, force_recompute: bool) -> Result<PlanReadout, FetchFailure> {
        if !force_recompute {
            let state = self.shared.state.lock().unwrap();
            if let Some(entry) = &state.entry {
                if entry.is_fresh(Utc::now()) {
                    return Ok(PlanReadout {
                        entry: entry.clone(),
                        change: None,
                        degraded: state.last_error.clone(),
                        from_cache: true,
                    });
                }
            }
        }

        let mut rx = {
            let mut in_flight = self.shared.in_flight.lock().await;
            match in_flight.as_ref() {
                Some(rx) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    *in_flight = Some(rx.clone());
                    self.spawn_refresh(tx, force_recompute);
                    rx
                }
            }
        };

        loop {
            if let Some(result) = rx.borrow_and_update().clone() {
                return result;
            }
            if rx.changed().await.is_err() {
                return Err(FetchFailure {
                    status: None,
                    code: None,
                    message: "plan refresh was aborted".to_string(),
                });
            }
        }
    }

    /// Entry currently held, without triggering any remote call.
    pub fn peek(&self) -> Option<PlanCacheEntry> {
        self.shared.state.lock().unwrap().entry.clone()
    }

    fn spawn_refresh(&self, tx: watch::Sender<Option<RefreshResult>>, force_recompute: bool) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let result = Self::refresh(&shared, force_recompute).await;
            // Clear the slot before publishing, so a waiter that immediately
            // re-fetches starts a new flight instead of joining this one.
            *shared.in_flight.lock().await = None;
            let _ = tx.send(Some(result));
        });
    }

    async fn refresh(shared: &Shared<F, S>, force_recompute: bool) -> RefreshResult {
        match shared.fetcher.fetch_plan(force_recompute).await {
            Ok(targets) => {
                let (entry, change) = {
                    let mut state = shared.state.lock().unwrap();
                    let previous = state.entry.take().map(|e| e.targets);
                    let change = previous.as_ref().map(|prev| targets.diff_from(prev));
                    let entry = PlanCacheEntry {
                        targets,
                        previous_targets: previous,
                        fetched_at: Utc::now(),
                        ttl_seconds: shared.ttl_seconds,
                    };
                    state.entry = Some(entry.clone());
                    state.last_error = None;
                    (entry, change)
                };

                if let Err(err) = shared.store.save(&entry).await {
                    tracing::warn!(error = %err, "failed to persist plan cache entry");
                }

                if let (Some(diff), Some(sink)) = (change, shared.sink.as_deref()) {
                    if diff.significant {
                        sink.plan_changed(diff);
                    }
                }

                Ok(PlanReadout {
                    entry,
                    change,
                    degraded: None,
                    from_cache: false,
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "plan refresh failed");
                let mut state = shared.state.lock().unwrap();
                match state.entry.clone() {
                    // Keep the last saved plan as the current value.
                    Some(entry) => {
                        let reason = format!("showing last saved data: {err}");
                        state.last_error = Some(reason.clone());
                        Ok(PlanReadout {
                            entry,
                            change: None,
                            degraded: Some(reason),
                            from_cache: true,
                        })
                    }
                    None => Err(FetchFailure::from(&err)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{Duration, Utc};
    use tokio::sync::Notify;

    use vitalis_core::plan::{PlanDiff, PlanTargets};

    use super::{ChangeSink, PlanCache, PlanFetch};
    use crate::api::ClientError;
    use crate::store::MemoryPlanStore;

    fn targets(calories: i32, protein: i32) -> PlanTargets {
        PlanTargets {
            calorie_target: calories,
            protein_target_g: protein,
            water_target_ml: 2450,
            bmr: 1649,
            tdee: 2556,
            weekly_rate_kg: -0.5,
            estimated_weeks: 10,
            projected_date: Utc::now().date_naive() + Duration::weeks(10),
        }
    }

    /// Scripted fetcher: pops one step per remote call, counting calls.
    struct ScriptedFetch {
        steps: std::sync::Mutex<Vec<Result<PlanTargets, ClientError>>>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedFetch {
        fn new(steps: Vec<Result<PlanTargets, ClientError>>) -> Self {
            Self {
                steps: std::sync::Mutex::new(steps),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        /// Block each remote call until the gate is notified.
        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PlanFetch for ScriptedFetch {
        async fn fetch_plan(&self, _force_recompute: bool) -> Result<PlanTargets, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let mut steps = self.steps.lock().unwrap();
            if steps.is_empty() {
                return Err(ClientError::Timeout);
            }
            steps.remove(0)
        }
    }

    fn network_error() -> ClientError {
        ClientError::Api {
            status: 500,
            code: "internal_error".to_string(),
            message: "An internal error occurred".to_string(),
        }
    }

    #[tokio::test]
    async fn second_fetch_within_ttl_issues_no_remote_call() {
        let fetch = Arc::new(ScriptedFetch::new(vec![Ok(targets(2000, 126))]));
        let cache = PlanCache::new(Arc::clone(&fetch), MemoryPlanStore::default()).await;

        let first = cache.fetch(false).await.unwrap();
        assert!(!first.from_cache);

        let second = cache.fetch(false).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.entry, first.entry);
        assert_eq!(fetch.calls(), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_a_refresh() {
        let fetch = Arc::new(ScriptedFetch::new(vec![
            Ok(targets(2000, 126)),
            Ok(targets(2000, 126)),
        ]));
        let cache = PlanCache::with_ttl(Arc::clone(&fetch), MemoryPlanStore::default(), 0).await;

        cache.fetch(false).await.unwrap();
        let second = cache.fetch(false).await.unwrap();

        assert!(!second.from_cache);
        assert_eq!(fetch.calls(), 2);
    }

    #[tokio::test]
    async fn failed_forced_refresh_keeps_last_known_good() {
        let fetch = Arc::new(ScriptedFetch::new(vec![
            Ok(targets(2000, 126)),
            Err(network_error()),
        ]));
        let cache = PlanCache::new(Arc::clone(&fetch), MemoryPlanStore::default()).await;

        let first = cache.fetch(false).await.unwrap();
        let degraded = cache.fetch(true).await.unwrap();

        assert_eq!(degraded.entry, first.entry);
        let reason = degraded.degraded.expect("degraded flag set");
        assert!(reason.contains("showing last saved data"));

        // The degraded flag sticks to cached reads until a refresh succeeds.
        let cached = cache.fetch(false).await.unwrap();
        assert!(cached.from_cache);
        assert!(cached.degraded.is_some());
    }

    #[tokio::test]
    async fn cold_cache_failure_surfaces_the_error() {
        let fetch = Arc::new(ScriptedFetch::new(vec![Err(network_error())]));
        let cache = PlanCache::new(Arc::clone(&fetch), MemoryPlanStore::default()).await;

        let err = cache.fetch(false).await.unwrap_err();
        assert_eq!(err.status, Some(500));
        assert!(cache.peek().is_none());
    }

    #[tokio::test]
    async fn concurrent_forced_fetches_share_one_remote_call() {
        let gate = Arc::new(Notify::new());
        let fetch = Arc::new(
            ScriptedFetch::new(vec![Ok(targets(2000, 126))]).gated(Arc::clone(&gate)),
        );
        let cache = PlanCache::new(Arc::clone(&fetch), MemoryPlanStore::default()).await;

        let a = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.fetch(true).await })
        };
        let b = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.fetch(true).await })
        };

        // Let both callers attach to the in-flight call before releasing it.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        gate.notify_one();

        let first = a.await.unwrap().unwrap();
        let second = b.await.unwrap().unwrap();

        assert_eq!(first.entry, second.entry);
        assert_eq!(fetch.calls(), 1);
    }

    #[tokio::test]
    async fn cancelling_one_waiter_does_not_cancel_the_shared_call() {
        let gate = Arc::new(Notify::new());
        let fetch = Arc::new(
            ScriptedFetch::new(vec![Ok(targets(2000, 126))]).gated(Arc::clone(&gate)),
        );
        let cache = PlanCache::new(Arc::clone(&fetch), MemoryPlanStore::default()).await;

        let doomed = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.fetch(true).await })
        };
        let survivor = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.fetch(true).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        doomed.abort();
        gate.notify_one();

        let readout = survivor.await.unwrap().unwrap();
        assert_eq!(readout.entry.targets, targets(2000, 126));
        assert_eq!(fetch.calls(), 1);
    }

    #[tokio::test]
    async fn refresh_diffs_against_the_previous_plan() {
        let fetch = Arc::new(ScriptedFetch::new(vec![
            Ok(targets(2000, 126)),
            Ok(targets(2100, 126)),
        ]));
        let cache = PlanCache::new(Arc::clone(&fetch), MemoryPlanStore::default()).await;

        cache.fetch(false).await.unwrap();
        let refreshed = cache.fetch(true).await.unwrap();

        let change = refreshed.change.expect("diff present");
        assert_eq!(change.calorie_delta, 100);
        assert!(change.significant);
        assert_eq!(
            refreshed.entry.previous_targets,
            Some(targets(2000, 126))
        );
    }

    struct RecordingSink(std::sync::Mutex<Vec<PlanDiff>>);

    impl ChangeSink for RecordingSink {
        fn plan_changed(&self, diff: PlanDiff) {
            self.0.lock().unwrap().push(diff);
        }
    }

    #[tokio::test]
    async fn significant_changes_reach_the_sink_insignificant_do_not() {
        let sink = Arc::new(RecordingSink(std::sync::Mutex::new(Vec::new())));
        let fetch = Arc::new(ScriptedFetch::new(vec![
            Ok(targets(2000, 126)),
            Ok(targets(2010, 126)), // within thresholds
            Ok(targets(2100, 126)), // significant
        ]));
        let cache = PlanCache::with_sink(
            Arc::clone(&fetch),
            MemoryPlanStore::default(),
            super::DEFAULT_TTL_SECONDS,
            sink.clone(),
        )
        .await;

        cache.fetch(false).await.unwrap();
        cache.fetch(true).await.unwrap();
        cache.fetch(true).await.unwrap();

        let seen = sink.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].calorie_delta, 90);
    }

    #[tokio::test]
    async fn entry_survives_restart_through_the_injected_store() {
        let store = MemoryPlanStore::default();
        let fetch = Arc::new(ScriptedFetch::new(vec![Ok(targets(2000, 126))]));

        let cache = PlanCache::new(Arc::clone(&fetch), store.clone()).await;
        cache.fetch(false).await.unwrap();

        // A second instance over the same store starts warm; an independent
        // store starts cold.
        let rehydrated =
            PlanCache::new(Arc::new(ScriptedFetch::new(vec![])), store.clone()).await;
        assert_eq!(rehydrated.peek().unwrap().targets, targets(2000, 126));

        let independent = PlanCache::new(
            Arc::new(ScriptedFetch::new(vec![])),
            MemoryPlanStore::default(),
        )
        .await;
        assert!(independent.peek().is_none());
    }
}
