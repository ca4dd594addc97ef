//! Single authoritative acknowledgment state.
//!
//! Every display surface reads this one object instead of caching the flag
//! separately, so two views of the acknowledgment can never drift apart.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub struct AckSnapshot {
    pub acknowledged: bool,
    pub metrics_computed_at: DateTime<Utc>,
    pub formula_version: i32,
}

#[derive(Clone)]
pub struct AckState {
    tx: Arc<watch::Sender<Option<AckSnapshot>>>,
}

impl AckState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Publish the latest observed state; every handle sees it immediately.
    pub fn update(&self, snapshot: AckSnapshot) {
        self.tx.send_replace(Some(snapshot));
    }

    /// Latest published state, the single source of truth for rendering.
    pub fn current(&self) -> Option<AckSnapshot> {
        self.tx.borrow().clone()
    }
}

impl Default for AckState {
    fn default() -> Self {
        Self::new()
    }
}
