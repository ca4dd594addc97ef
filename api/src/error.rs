use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vitalis_core::error::{self, ApiError, CoreError};
use vitalis_core::store::StoreError;

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Requested record does not exist (404)
    NotFound { resource: String },
    /// Plan-generation precondition not met (409). A business-rule failure,
    /// never mapped to a 5xx.
    Gate { message: String },
    /// Storage or other internal error (500). The detail is logged, never
    /// exposed to the caller.
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // TODO: extract request_id from extensions once middleware is wired
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                    next_action: None,
                    next_action_url: None,
                },
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{resource} not found"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                    next_action: None,
                    next_action_url: None,
                },
            ),
            AppError::Gate { message } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::ACKNOWLEDGMENT_REQUIRED.to_string(),
                    message,
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: Some(
                        "Fetch GET /v1/metrics/today, show the numbers to the user, then \
                         POST /v1/metrics/acknowledge with the snapshot's formula_version \
                         and computed_at."
                            .to_string(),
                    ),
                    next_action: Some("acknowledge_metrics".to_string()),
                    next_action_url: Some("/v1/metrics/today".to_string()),
                },
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                        next_action: None,
                        next_action_url: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { field, message } => AppError::Validation {
                message,
                field,
                received: None,
                docs_hint: None,
            },
            CoreError::NotFound { resource } => AppError::NotFound { resource },
            CoreError::Gate(message) => AppError::Gate { message },
            CoreError::Store(err) => AppError::Internal(err.to_string()),
        }
    }
}
