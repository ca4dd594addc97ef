//! Custom extractors that convert axum rejections to structured AppError responses.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use uuid::Uuid;

use crate::error::AppError;

/// Authenticated user identity, read from the `x-user-id` header.
///
/// Temporary until real auth lands: the session layer in front of this service
/// is expected to supply a stable user UUID per request.
pub struct UserId(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_val = parts
            .headers
            .get("x-user-id")
            .ok_or_else(|| AppError::Validation {
                message: "x-user-id header is required (temporary, will be replaced by auth)"
                    .to_string(),
                field: Some("headers.x-user-id".to_string()),
                received: None,
                docs_hint: Some("Pass x-user-id as a UUID header.".to_string()),
            })?;

        let user_id_str = header_val.to_str().map_err(|_| AppError::Validation {
            message: "x-user-id must be a valid UTF-8 string".to_string(),
            field: Some("headers.x-user-id".to_string()),
            received: None,
            docs_hint: None,
        })?;

        let user_id = Uuid::parse_str(user_id_str).map_err(|_| AppError::Validation {
            message: "x-user-id must be a valid UUID".to_string(),
            field: Some("headers.x-user-id".to_string()),
            received: Some(serde_json::Value::String(user_id_str.to_string())),
            docs_hint: Some(
                "Use a valid UUIDv4 or UUIDv7, e.g. 'a1b2c3d4-e5f6-7890-abcd-ef1234567890'"
                    .to_string(),
            ),
        })?;

        Ok(UserId(user_id))
    }
}

/// JSON extractor that converts deserialization errors to structured
/// `AppError::Validation` responses instead of axum's plain-text 422.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

fn map_json_rejection(rejection: JsonRejection) -> AppError {
    let body_text = rejection.body_text();
    let field_hint = extract_field_from_serde_message(&body_text);

    AppError::Validation {
        message: format!("Invalid request body: {body_text}"),
        field: Some(field_hint.unwrap_or("body".to_string())),
        received: None,
        docs_hint: Some(
            "Check the request body against the endpoint's schema (GET /api-doc/openapi.json)."
                .to_string(),
        ),
    }
}

/// Try to extract a field name from serde's error messages,
/// e.g. "missing field `formula_version`" → "formula_version".
fn extract_field_from_serde_message(msg: &str) -> Option<String> {
    for pattern in ["missing field `", "unknown field `"] {
        if let Some(start) = msg.find(pattern) {
            let after = &msg[start + pattern.len()..];
            if let Some(end) = after.find('`') {
                return Some(after[..end].to_string());
            }
        }
    }
    None
}
