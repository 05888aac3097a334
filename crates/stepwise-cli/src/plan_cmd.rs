//! `stepwise plan` and `stepwise history` commands.

use anyhow::Result;
use sqlx::PgPool;

use stepwise_core::plan::{PlanEnvelope, PlanService};
use stepwise_db::models::StoredPlan;
use stepwise_db::queries::plans as plan_db;

const GOAL_PREVIEW_CHARS: usize = 60;

/// Run the plan pipeline once and print the `{plan}` envelope as JSON.
pub async fn run_plan(service: &PlanService, goal: &str) -> Result<()> {
    let outcome = service.create_plan(goal).await?;
    tracing::info!(source = %outcome.source, "plan ready");

    let envelope = PlanEnvelope { plan: outcome.plan };
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

/// List the most recent stored plans, newest first.
pub async fn run_history(pool: &PgPool, limit: i64) -> Result<()> {
    let plans = plan_db::list_recent_plans(pool, limit).await?;
    if plans.is_empty() {
        println!("No plans found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<20}  {:<11}  {:>5}  GOAL",
        "ID", "CREATED", "SOURCE", "TASKS"
    );
    for plan in &plans {
        println!("{}", history_line(plan));
    }
    Ok(())
}

fn history_line(plan: &StoredPlan) -> String {
    let tasks = plan.plan["tasks"].as_array().map_or(0, Vec::len);
    format!(
        "{:<36}  {:<20}  {:<11}  {:>5}  {}",
        plan.id,
        plan.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        plan.source.to_string(),
        tasks,
        preview(&plan.goal),
    )
}

/// First line of `goal`, cut to a fixed number of characters.
fn preview(goal: &str) -> String {
    let line = goal.trim().lines().next().unwrap_or_default();
    match line.char_indices().nth(GOAL_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}
