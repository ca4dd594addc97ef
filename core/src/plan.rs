use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;
use crate::metrics::{MetricsSnapshot, Profile};

/// A plan refresh is "significant" when it moves calories by more than this.
pub const SIGNIFICANT_CALORIE_DELTA: i32 = 50;
/// ...or protein by more than this many grams.
pub const SIGNIFICANT_PROTEIN_DELTA_G: i32 = 10;

/// Calorie targets never drop below this, whatever the requested rate.
pub const MIN_CALORIE_TARGET: i32 = 1200;

const KCAL_PER_KG: f64 = 7700.0;
const MIN_WEEKLY_RATE_KG: f64 = 0.25;
const MAX_WEEKLY_RATE_KG: f64 = 1.0;
const DEFAULT_WEEKLY_RATE_KG: f64 = 0.5;
const PROTEIN_G_PER_KG: f64 = 1.8;
const WATER_ML_PER_KG: f64 = 35.0;

/// Personalized daily targets derived from a metrics snapshot and the user's
/// goal. Pure and deterministic for fixed inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlanTargets {
    pub calorie_target: i32,
    pub protein_target_g: i32,
    pub water_target_ml: i32,
    pub bmr: i32,
    pub tdee: i32,
    /// Signed kg per week: negative while losing, zero at maintenance.
    pub weekly_rate_kg: f64,
    pub estimated_weeks: i32,
    pub projected_date: NaiveDate,
}

impl PlanTargets {
    /// Diff against the previously held targets.
    pub fn diff_from(&self, previous: &PlanTargets) -> PlanDiff {
        let calorie_delta = self.calorie_target - previous.calorie_target;
        let protein_delta_g = self.protein_target_g - previous.protein_target_g;
        PlanDiff {
            calorie_delta,
            protein_delta_g,
            significant: calorie_delta.abs() > SIGNIFICANT_CALORIE_DELTA
                || protein_delta_g.abs() > SIGNIFICANT_PROTEIN_DELTA_G,
        }
    }
}

/// Change between two consecutive plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlanDiff {
    pub calorie_delta: i32,
    pub protein_delta_g: i32,
    pub significant: bool,
}

/// Build daily targets from the user's goal and today's snapshot.
///
/// The weekly rate is the user's preference clamped to [0.25, 1.0] kg, signed
/// toward the goal; the daily calorie adjustment follows from 7700 kcal per kg
/// of body mass. Targets are floored at [`MIN_CALORIE_TARGET`].
pub fn build_targets(
    profile: &Profile,
    snapshot: &MetricsSnapshot,
    today: NaiveDate,
) -> Result<PlanTargets, CoreError> {
    let weight_kg = profile.weight_kg.ok_or_else(|| {
        CoreError::validation("weight_kg", "weight is required to build a plan")
    })?;

    let goal_kg = profile.goal_weight_kg.unwrap_or(weight_kg);
    let to_goal_kg = goal_kg - weight_kg;

    let protein_target_g = (weight_kg * PROTEIN_G_PER_KG).round() as i32;
    let water_target_ml = (weight_kg * WATER_ML_PER_KG).round() as i32;

    // Maintenance: already at goal.
    if to_goal_kg.abs() < 0.05 {
        return Ok(PlanTargets {
            calorie_target: snapshot.tdee.max(MIN_CALORIE_TARGET),
            protein_target_g,
            water_target_ml,
            bmr: snapshot.bmr,
            tdee: snapshot.tdee,
            weekly_rate_kg: 0.0,
            estimated_weeks: 0,
            projected_date: today,
        });
    }

    let rate_kg = profile
        .weekly_goal_kg
        .unwrap_or(DEFAULT_WEEKLY_RATE_KG)
        .abs()
        .clamp(MIN_WEEKLY_RATE_KG, MAX_WEEKLY_RATE_KG);
    let daily_adjustment = (rate_kg * KCAL_PER_KG / 7.0).round() as i32;

    let calorie_target = if to_goal_kg < 0.0 {
        (snapshot.tdee - daily_adjustment).max(MIN_CALORIE_TARGET)
    } else {
        snapshot.tdee + daily_adjustment
    };

    let estimated_weeks = (to_goal_kg.abs() / rate_kg).ceil() as i32;

    Ok(PlanTargets {
        calorie_target,
        protein_target_g,
        water_target_ml,
        bmr: snapshot.bmr,
        tdee: snapshot.tdee,
        weekly_rate_kg: rate_kg * to_goal_kg.signum(),
        estimated_weeks,
        projected_date: today + Duration::weeks(i64::from(estimated_weeks)),
    })
}
