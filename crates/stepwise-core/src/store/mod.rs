//! Best-effort persistence of produced plans.
//!
//! [`PlanSink`] is the seam; [`PgPlanSink`] appends to the `plans` table.
//! A deployment without a database simply has no sink.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use stepwise_db::models::PlanSource;
use stepwise_db::queries::plans as plan_queries;

use crate::plan::Plan;

/// One plan to append to durable storage.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRecord {
    pub goal: String,
    pub plan: Plan,
    pub source: PlanSource,
    pub created_at: DateTime<Utc>,
}

/// Append-only destination for produced plans.
#[async_trait]
pub trait PlanSink: Send + Sync {
    /// Short name for logs (e.g. "postgres").
    fn name(&self) -> &str;

    async fn record(&self, record: &PlanRecord) -> Result<()>;
}

/// Stores plans in PostgreSQL as JSONB.
#[derive(Debug, Clone)]
pub struct PgPlanSink {
    pool: PgPool,
}

impl PgPlanSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanSink for PgPlanSink {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn record(&self, record: &PlanRecord) -> Result<()> {
        let body = serde_json::to_value(&record.plan).context("failed to serialize plan")?;
        let stored = plan_queries::insert_plan(
            &self.pool,
            &record.goal,
            &body,
            record.source,
            record.created_at,
        )
        .await?;
        tracing::debug!(plan_id = %stored.id, "plan saved");
        Ok(())
    }
}
