use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Liveness probe for the metrics service
///
/// Answers `ok` only when the snapshot database is reachable. A running
/// process without its database reports `database_unreachable` with a 503, so
/// the host gets restarted instead of silently missing daily recompute runs.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "API and snapshot database reachable", body = HealthResponse),
        (status = 503, description = "Snapshot database unreachable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();

    let (http_status, status) = readiness(db_ok);
    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

fn readiness(db_ok: bool) -> (StatusCode, &'static str) {
    if db_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "database_unreachable")
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::readiness;

    #[test]
    fn readiness_follows_the_database_state() {
        assert_eq!(readiness(true), (StatusCode::OK, "ok"));
        assert_eq!(
            readiness(false),
            (StatusCode::SERVICE_UNAVAILABLE, "database_unreachable")
        );
    }
}
