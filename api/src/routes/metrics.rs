use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use vitalis_core::ack::{Acknowledgment, AcknowledgmentTracker};
use vitalis_core::error::ApiError;
use vitalis_core::metrics::{self, MetricsExplanations, MetricsSnapshot};
use vitalis_core::service::MetricsService;

use crate::error::AppError;
use crate::extract::{AppJson, UserId};
use crate::state::AppState;
use crate::storage::{PgAcks, PgMetrics, PgProfiles};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/metrics/today", get(today_metrics))
        .route("/v1/metrics/acknowledge", post(acknowledge_metrics))
}

/// Today's metrics plus acknowledgment status, in one read.
#[derive(Debug, Serialize, ToSchema)]
pub struct TodayMetricsResponse {
    pub metrics: MetricsSnapshot,
    pub explanations: MetricsExplanations,
    pub acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledgement: Option<Acknowledgment>,
}

/// Get today's metrics snapshot
///
/// Returns the current-day snapshot with plain-language explanations and the
/// acknowledgment state. 404 until the first computation for today has run
/// (the daily batch, or plan generation, whichever comes first).
#[utoipa::path(
    get,
    path = "/v1/metrics/today",
    responses(
        (status = 200, description = "Today's snapshot", body = TodayMetricsResponse),
        (status = 400, description = "Missing or malformed x-user-id", body = ApiError),
        (status = 404, description = "Nothing computed for today yet", body = ApiError)
    ),
    tag = "metrics"
)]
pub async fn today_metrics(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<TodayMetricsResponse>, AppError> {
    let service = MetricsService::new(
        PgProfiles::new(state.db.clone()),
        PgMetrics::new(state.db.clone()),
    );
    let snapshot = service.get_today(user_id).await?;

    let tracker = AcknowledgmentTracker::new(PgAcks::new(state.db.clone()));
    let acknowledgement = tracker
        .acknowledgment_for(user_id, snapshot.computed_at)
        .await?;

    Ok(Json(TodayMetricsResponse {
        explanations: metrics::explanations(&snapshot),
        acknowledged: acknowledgement.is_some(),
        metrics: snapshot,
        acknowledgement,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AcknowledgeRequest {
    /// Formula version of the snapshot being acknowledged
    pub formula_version: i32,
    /// `computed_at` of the snapshot being acknowledged
    pub metrics_computed_at: DateTime<Utc>,
}

/// Acknowledge a metrics snapshot
///
/// Idempotent: acknowledging the same snapshot twice (including concurrent
/// retries) returns the original acknowledgment unchanged, never a conflict.
#[utoipa::path(
    post,
    path = "/v1/metrics/acknowledge",
    request_body = AcknowledgeRequest,
    responses(
        (status = 200, description = "The (possibly pre-existing) acknowledgment", body = Acknowledgment),
        (status = 400, description = "Malformed request", body = ApiError)
    ),
    tag = "metrics"
)]
pub async fn acknowledge_metrics(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    AppJson(req): AppJson<AcknowledgeRequest>,
) -> Result<Json<Acknowledgment>, AppError> {
    let tracker = AcknowledgmentTracker::new(PgAcks::new(state.db.clone()));
    let acknowledgment = tracker
        .acknowledge(user_id, req.formula_version, req.metrics_computed_at)
        .await?;
    Ok(Json(acknowledgment))
}
