//! Postgres-backed implementations of the core storage seams.
//!
//! The snapshot table is append-only, so inserts need no locking beyond the
//! normal transactional insert; the acknowledgment race is resolved by the
//! unique constraint (`ON CONFLICT DO NOTHING` + re-select).

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use vitalis_core::ack::Acknowledgment;
use vitalis_core::metrics::{ActivityLevel, Gender, MetricsSnapshot, Profile};
use vitalis_core::store::{AckStore, MetricsStore, ProfileReader, StoreError};

fn db(err: sqlx::Error) -> StoreError {
    StoreError::new(err)
}

#[derive(Clone)]
pub struct PgProfiles {
    pool: PgPool,
}

impl PgProfiles {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    weight_kg: Option<f64>,
    height_cm: Option<f64>,
    age_years: Option<i32>,
    gender: Option<String>,
    activity_level: Option<String>,
    goal_weight_kg: Option<f64>,
    weekly_goal_kg: Option<f64>,
    onboarding_completed: bool,
}

impl ProfileRow {
    fn into_profile(self) -> Profile {
        Profile {
            user_id: self.user_id,
            weight_kg: self.weight_kg,
            height_cm: self.height_cm,
            age_years: self.age_years,
            gender: self.gender.as_deref().and_then(Gender::parse),
            activity_level: self.activity_level.as_deref().and_then(ActivityLevel::parse),
            goal_weight_kg: self.goal_weight_kg,
            weekly_goal_kg: self.weekly_goal_kg,
            onboarding_completed: self.onboarding_completed,
        }
    }
}

impl ProfileReader for PgProfiles {
    async fn profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, weight_kg, height_cm, age_years, gender, activity_level,
                   goal_weight_kg, weekly_goal_kg, onboarding_completed
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        Ok(row.map(ProfileRow::into_profile))
    }

    async fn onboarded_users(&self) -> Result<Vec<Uuid>, StoreError> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_id
            FROM profiles
            WHERE onboarding_completed
            ORDER BY user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db)
    }
}

#[derive(Clone)]
pub struct PgMetrics {
    pool: PgPool,
}

impl PgMetrics {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: Uuid,
    user_id: Uuid,
    bmi: f64,
    bmr: i32,
    tdee: i32,
    computed_at: DateTime<Utc>,
    computed_on: NaiveDate,
    formula_version: i32,
}

impl SnapshotRow {
    fn into_snapshot(self) -> MetricsSnapshot {
        MetricsSnapshot {
            id: self.id,
            user_id: self.user_id,
            bmi: self.bmi,
            bmr: self.bmr,
            tdee: self.tdee,
            computed_at: self.computed_at,
            computed_on: self.computed_on,
            formula_version: self.formula_version,
        }
    }
}

impl MetricsStore for PgMetrics {
    async fn find_for_day(
        &self,
        user_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<MetricsSnapshot>, StoreError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, user_id, bmi, bmr, tdee, computed_at, computed_on, formula_version
            FROM metrics_snapshots
            WHERE user_id = $1 AND computed_on = $2
            ORDER BY computed_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(day)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        Ok(row.map(SnapshotRow::into_snapshot))
    }

    async fn insert(&self, snapshot: &MetricsSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO metrics_snapshots
                (id, user_id, bmi, bmr, tdee, computed_at, computed_on, formula_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(snapshot.id)
        .bind(snapshot.user_id)
        .bind(snapshot.bmi)
        .bind(snapshot.bmr)
        .bind(snapshot.tdee)
        .bind(snapshot.computed_at)
        .bind(snapshot.computed_on)
        .bind(snapshot.formula_version)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(())
    }
}

#[derive(Clone)]
pub struct PgAcks {
    pool: PgPool,
}

impl PgAcks {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AckRow {
    id: Uuid,
    user_id: Uuid,
    metrics_computed_at: DateTime<Utc>,
    formula_version: i32,
    acknowledged_at: DateTime<Utc>,
}

impl AckRow {
    fn into_ack(self) -> Acknowledgment {
        Acknowledgment {
            id: self.id,
            user_id: self.user_id,
            metrics_computed_at: self.metrics_computed_at,
            formula_version: self.formula_version,
            acknowledged_at: self.acknowledged_at,
        }
    }
}

impl AckStore for PgAcks {
    async fn insert_or_fetch(
        &self,
        candidate: &Acknowledgment,
    ) -> Result<Acknowledgment, StoreError> {
        // DO NOTHING instead of DO UPDATE keeps the stored row immutable; a
        // concurrent duplicate loses the insert and falls through to the
        // re-select, so both callers observe the same winning row.
        let inserted = sqlx::query_as::<_, AckRow>(
            r#"
            INSERT INTO acknowledgments
                (id, user_id, metrics_computed_at, formula_version, acknowledged_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, metrics_computed_at, formula_version) DO NOTHING
            RETURNING id, user_id, metrics_computed_at, formula_version, acknowledged_at
            "#,
        )
        .bind(candidate.id)
        .bind(candidate.user_id)
        .bind(candidate.metrics_computed_at)
        .bind(candidate.formula_version)
        .bind(candidate.acknowledged_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        if let Some(row) = inserted {
            return Ok(row.into_ack());
        }

        let existing = sqlx::query_as::<_, AckRow>(
            r#"
            SELECT id, user_id, metrics_computed_at, formula_version, acknowledged_at
            FROM acknowledgments
            WHERE user_id = $1 AND metrics_computed_at = $2 AND formula_version = $3
            "#,
        )
        .bind(candidate.user_id)
        .bind(candidate.metrics_computed_at)
        .bind(candidate.formula_version)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        Ok(existing.into_ack())
    }

    async fn find(
        &self,
        user_id: Uuid,
        metrics_computed_at: DateTime<Utc>,
    ) -> Result<Option<Acknowledgment>, StoreError> {
        let row = sqlx::query_as::<_, AckRow>(
            r#"
            SELECT id, user_id, metrics_computed_at, formula_version, acknowledged_at
            FROM acknowledgments
            WHERE user_id = $1 AND metrics_computed_at = $2
            ORDER BY formula_version DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(metrics_computed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        Ok(row.map(AckRow::into_ack))
    }

    async fn exists(
        &self,
        user_id: Uuid,
        metrics_computed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM acknowledgments
                WHERE user_id = $1 AND metrics_computed_at = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(metrics_computed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db)
    }
}
