use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use vitalis_core::ack::AcknowledgmentTracker;
use vitalis_core::error::ApiError;
use vitalis_core::gate::PlanGenerationGate;
use vitalis_core::metrics::MetricsSnapshot;
use vitalis_core::plan::{self, PlanTargets};
use vitalis_core::service::MetricsService;
use vitalis_core::store::ProfileReader;

use crate::error::AppError;
use crate::extract::{AppJson, UserId};
use crate::state::AppState;
use crate::storage::{PgAcks, PgMetrics, PgProfiles};

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/plan/generate", post(generate_plan))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GeneratePlanRequest {
    /// Recompute today's metrics even when a snapshot already exists
    #[serde(default)]
    pub force_recompute: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlanResponse {
    pub targets: PlanTargets,
    /// The snapshot the targets were derived from
    pub metrics: MetricsSnapshot,
    pub generated_at: DateTime<Utc>,
}

/// Generate the personalized daily plan
///
/// The acknowledgment gate runs first, inside this entry point, so no caller
/// — including direct protocol-level ones — can generate a plan against
/// numbers the user has not confirmed. With no snapshot yet (bootstrap), the
/// gate allows and generation computes the first one.
#[utoipa::path(
    post,
    path = "/v1/plan/generate",
    request_body = GeneratePlanRequest,
    responses(
        (status = 200, description = "Generated plan", body = PlanResponse),
        (status = 400, description = "Malformed request or incomplete profile", body = ApiError),
        (status = 404, description = "Profile does not exist", body = ApiError),
        (status = 409, description = "Today's metrics are not acknowledged yet", body = ApiError)
    ),
    tag = "plan"
)]
pub async fn generate_plan(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    AppJson(req): AppJson<GeneratePlanRequest>,
) -> Result<Json<PlanResponse>, AppError> {
    let profiles = PgProfiles::new(state.db.clone());
    let service = MetricsService::new(profiles.clone(), PgMetrics::new(state.db.clone()));
    let tracker = AcknowledgmentTracker::new(PgAcks::new(state.db.clone()));

    PlanGenerationGate::new(&service, &tracker)
        .can_generate(user_id)
        .await?;

    let snapshot = service
        .compute_and_store(user_id, req.force_recompute)
        .await?;

    let profile = profiles
        .profile(user_id)
        .await?
        .ok_or(AppError::NotFound {
            resource: format!("profile for user {user_id}"),
        })?;

    let targets = plan::build_targets(&profile, &snapshot, snapshot.computed_on)?;

    Ok(Json(PlanResponse {
        targets,
        metrics: snapshot,
        generated_at: Utc::now(),
    }))
}
