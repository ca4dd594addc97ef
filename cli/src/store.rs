//! Persistence backends for the plan cache. The backend is injected at cache
//! construction so independent consumers (tests, sessions) never observe each
//! other's data.

use std::future::Future;
use std::path::PathBuf;

use vitalis_core::store::StoreError;

use crate::cache::PlanCacheEntry;

pub trait PlanStore: Send + Sync + 'static {
    fn load(&self) -> impl Future<Output = Result<Option<PlanCacheEntry>, StoreError>> + Send;

    fn save(&self, entry: &PlanCacheEntry)
    -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// File-backed store under the user's config directory (or any explicit path).
#[derive(Clone)]
pub struct FilePlanStore {
    path: PathBuf,
}

impl FilePlanStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default location: `<config dir>/vitalis/plan_cache.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vitalis")
            .join("plan_cache.json")
    }
}

impl PlanStore for FilePlanStore {
    async fn load(&self) -> Result<Option<PlanCacheEntry>, StoreError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::new(err)),
        };
        let entry = serde_json::from_str(&data).map_err(StoreError::new)?;
        Ok(Some(entry))
    }

    async fn save(&self, entry: &PlanCacheEntry) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(StoreError::new)?;
        }
        let data = serde_json::to_string_pretty(entry).map_err(StoreError::new)?;
        tokio::fs::write(&self.path, data)
            .await
            .map_err(StoreError::new)?;
        Ok(())
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub struct MemoryPlanStore {
    entry: std::sync::Arc<std::sync::Mutex<Option<PlanCacheEntry>>>,
}

#[cfg(test)]
impl PlanStore for MemoryPlanStore {
    async fn load(&self) -> Result<Option<PlanCacheEntry>, StoreError> {
        Ok(self.entry.lock().unwrap().clone())
    }

    async fn save(&self, entry: &PlanCacheEntry) -> Result<(), StoreError> {
        *self.entry.lock().unwrap() = Some(entry.clone());
        Ok(())
    }
}
