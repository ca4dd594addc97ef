use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::store::StoreError;

/// Domain-level failure shared by the metrics service, tracker, and gate.
///
/// `Validation` and `Gate` are business-rule failures: they describe something
/// the caller did, never a fault of the server, and must not surface as 5xx.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or incomplete profile inputs. Reported to the caller, not retried.
    #[error("{message}")]
    Validation {
        field: Option<String>,
        message: String,
    },
    /// The requested record does not exist yet. Recoverable — the caller may
    /// treat it as "not ready".
    #[error("{resource} not found")]
    NotFound { resource: String },
    /// Precondition for plan generation not met. The message is actionable and
    /// surfaced verbatim to the UI layer.
    #[error("{0}")]
    Gate(String),
    /// Underlying storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        CoreError::NotFound {
            resource: resource.into(),
        }
    }
}

/// Structured error response — designed for agents, not humans.
/// Every error contains enough information for the caller to understand
/// what went wrong and how to fix it.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "not_found")
    pub error: String,
    /// Human/agent-readable description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
    /// Recommended client action identifier (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    /// Optional URL/deep-link target for remediation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action_url: Option<String>,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const ACKNOWLEDGMENT_REQUIRED: &str = "acknowledgment_required";
    pub const INTERNAL_ERROR: &str = "internal_error";
}
