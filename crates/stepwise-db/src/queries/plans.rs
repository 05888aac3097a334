//! Database query functions for the `plans` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{PlanCounts, PlanSource, StoredPlan};

/// Insert a plan row. Returns the inserted row with its server-generated id.
pub async fn insert_plan(
    pool: &PgPool,
    goal: &str,
    plan: &serde_json::Value,
    source: PlanSource,
    created_at: DateTime<Utc>,
) -> Result<StoredPlan> {
    let stored = sqlx::query_as::<_, StoredPlan>(
        "INSERT INTO plans (goal, plan, source, created_at) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(goal)
    .bind(plan)
    .bind(source)
    .bind(created_at)
    .fetch_one(pool)
    .await
    .context("failed to insert plan")?;

    Ok(stored)
}

/// Fetch a plan by its ID.
pub async fn get_plan(pool: &PgPool, id: Uuid) -> Result<Option<StoredPlan>> {
    let plan = sqlx::query_as::<_, StoredPlan>("SELECT * FROM plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch plan")?;

    Ok(plan)
}

/// List the most recent plans, newest first.
pub async fn list_recent_plans(pool: &PgPool, limit: i64) -> Result<Vec<StoredPlan>> {
    let plans = sqlx::query_as::<_, StoredPlan>(
        "SELECT * FROM plans ORDER BY created_at DESC, id LIMIT $1",
    )
    .bind(limit.max(0))
    .fetch_all(pool)
    .await
    .context("failed to list plans")?;

    Ok(plans)
}

/// Count stored plans per source.
pub async fn count_plans(pool: &PgPool) -> Result<PlanCounts> {
    let counts = sqlx::query_as::<_, PlanCounts>(
        "SELECT \
           COUNT(*) FILTER (WHERE source = 'generated') AS generated, \
           COUNT(*) FILTER (WHERE source = 'synthesized') AS synthesized \
         FROM plans",
    )
    .fetch_one(pool)
    .await
    .context("failed to count plans")?;

    Ok(counts)
}
