use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::CoreError;

/// Monotonic version of the metric formulas. Bump when an equation or
/// multiplier changes so acknowledgments stay bound to the numbers the user
/// actually saw.
pub const FORMULA_VERSION: i32 = 1;

/// Validation bounds for profile inputs. Values outside are rejected, not clamped.
pub const MAX_WEIGHT_KG: f64 = 1000.0;
pub const MAX_HEIGHT_CM: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// Activity tiers and their TDEE multipliers (five discrete levels, 1.2–1.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    LightlyActive,
    ModeratelyActive,
    VeryActive,
    ExtraActive,
}

impl ActivityLevel {
    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::LightlyActive => 1.375,
            ActivityLevel::ModeratelyActive => 1.55,
            ActivityLevel::VeryActive => 1.725,
            ActivityLevel::ExtraActive => 1.9,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::LightlyActive => "lightly_active",
            ActivityLevel::ModeratelyActive => "moderately_active",
            ActivityLevel::VeryActive => "very_active",
            ActivityLevel::ExtraActive => "extra_active",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sedentary" => Some(ActivityLevel::Sedentary),
            "lightly_active" => Some(ActivityLevel::LightlyActive),
            "moderately_active" => Some(ActivityLevel::ModeratelyActive),
            "very_active" => Some(ActivityLevel::VeryActive),
            "extra_active" => Some(ActivityLevel::ExtraActive),
            _ => None,
        }
    }
}

/// Profile inputs as read from the profile collaborator. Optional fields model
/// incomplete onboarding — a user may exist long before their measurements do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub age_years: Option<i32>,
    pub gender: Option<Gender>,
    pub activity_level: Option<ActivityLevel>,
    pub goal_weight_kg: Option<f64>,
    pub weekly_goal_kg: Option<f64>,
    pub onboarding_completed: bool,
}

impl Profile {
    /// Complete computation inputs, or `None` when any required field is missing.
    pub fn body_inputs(&self) -> Option<BodyInputs> {
        Some(BodyInputs {
            weight_kg: self.weight_kg?,
            height_cm: self.height_cm?,
            age_years: self.age_years?,
            gender: self.gender?,
            activity_level: self.activity_level?,
        })
    }
}

/// Complete inputs for one metric computation.
#[derive(Debug, Clone, Copy)]
pub struct BodyInputs {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age_years: i32,
    pub gender: Gender,
    pub activity_level: ActivityLevel,
}

impl BodyInputs {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.weight_kg > 0.0 && self.weight_kg <= MAX_WEIGHT_KG) {
            return Err(CoreError::validation(
                "weight_kg",
                format!(
                    "weight must be in (0, {MAX_WEIGHT_KG}] kg, got {}",
                    self.weight_kg
                ),
            ));
        }
        if !(self.height_cm > 0.0 && self.height_cm <= MAX_HEIGHT_CM) {
            return Err(CoreError::validation(
                "height_cm",
                format!(
                    "height must be in (0, {MAX_HEIGHT_CM}] cm, got {}",
                    self.height_cm
                ),
            ));
        }
        Ok(())
    }
}

/// An immutable, per-day computed metrics record. Never mutated after creation;
/// a new day (or a force-recompute) creates a new row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MetricsSnapshot {
    /// Unique snapshot ID (UUIDv7 — time-sortable)
    pub id: Uuid,
    /// Owner of this snapshot
    pub user_id: Uuid,
    /// Body Mass Index, rounded to 2 decimals
    pub bmi: f64,
    /// Basal Metabolic Rate in kcal/day (Mifflin-St Jeor)
    pub bmr: i32,
    /// Total Daily Energy Expenditure in kcal/day
    pub tdee: i32,
    /// Exact computation instant
    pub computed_at: DateTime<Utc>,
    /// Calendar-day bucket of `computed_at`
    pub computed_on: NaiveDate,
    /// Formula version the numbers were produced with
    pub formula_version: i32,
}

/// BMI = kg / m², rounded to 2 decimals.
pub fn bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let height_m = height_cm / 100.0;
    let raw = weight_kg / (height_m * height_m);
    (raw * 100.0).round() / 100.0
}

/// Basal Metabolic Rate via Mifflin-St Jeor, rounded to whole kcal.
/// The constant term is gender-specific: +5 for men, -161 for women.
pub fn bmr(inputs: &BodyInputs) -> i32 {
    let constant = match inputs.gender {
        Gender::Male => 5.0,
        Gender::Female => -161.0,
    };
    let raw = 10.0 * inputs.weight_kg + 6.25 * inputs.height_cm
        - 5.0 * f64::from(inputs.age_years)
        + constant;
    raw.round() as i32
}

/// TDEE = BMR × activity multiplier, rounded to whole kcal.
pub fn tdee(bmr: i32, activity_level: ActivityLevel) -> i32 {
    (f64::from(bmr) * activity_level.multiplier()).round() as i32
}

/// Validate inputs and produce a complete snapshot for `now`.
pub fn compute(
    user_id: Uuid,
    inputs: &BodyInputs,
    now: DateTime<Utc>,
) -> Result<MetricsSnapshot, CoreError> {
    inputs.validate()?;
    let bmr = bmr(inputs);
    Ok(MetricsSnapshot {
        id: Uuid::now_v7(),
        user_id,
        bmi: bmi(inputs.weight_kg, inputs.height_cm),
        bmr,
        tdee: tdee(bmr, inputs.activity_level),
        computed_at: now,
        computed_on: now.date_naive(),
        formula_version: FORMULA_VERSION,
    })
}

/// Plain-language explanations served alongside a snapshot.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MetricsExplanations {
    pub bmi: String,
    pub bmr: String,
    pub tdee: String,
}

fn bmi_category(bmi: f64) -> &'static str {
    if bmi < 18.5 {
        "underweight"
    } else if bmi < 25.0 {
        "normal weight"
    } else if bmi < 30.0 {
        "overweight"
    } else {
        "obese"
    }
}

pub fn explanations(snapshot: &MetricsSnapshot) -> MetricsExplanations {
    MetricsExplanations {
        bmi: format!(
            "Your BMI of {} falls in the {} range.",
            snapshot.bmi,
            bmi_category(snapshot.bmi)
        ),
        bmr: format!(
            "Your body burns about {} kcal per day at complete rest.",
            snapshot.bmr
        ),
        tdee: format!(
            "With your activity level you burn about {} kcal per day in total.",
            snapshot.tdee
        ),
    }
}
