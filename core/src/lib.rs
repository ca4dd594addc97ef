//! Shared domain logic for Vitalis: daily body-metric computation,
//! acknowledgment tracking, the plan-generation gate, and plan targets.
//!
//! Everything here is storage-agnostic. The traits in [`store`] are the seam:
//! the API crate plugs in Postgres, tests plug in memory.

pub mod ack;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod plan;
pub mod scheduler;
pub mod service;
pub mod store;
