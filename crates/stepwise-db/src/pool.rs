//! Pool setup, migrations and first-run database creation for `plans`.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::{debug, info};

use crate::config::{DbConfig, redact_url};

/// Migrations compiled in from `crates/stepwise-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Plan requests write one row each, so a small pool is enough.
const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Open the pool used by the plan sink and the history queries.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    let target = config.redacted_url();
    debug!(url = %target, "connecting to plan store");
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to plan store at {target}"))
}

/// Bring the `plans` schema up to date.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to migrate the plans schema")?;
    info!(migrations = MIGRATOR.iter().count(), "plans schema up to date");
    Ok(())
}

/// Create the configured database if the server does not have it yet.
///
/// Returns `true` when the database was created by this call.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<bool> {
    let name = config
        .database_name()
        .context("database URL does not name a database")?;
    let create = create_database_statement(name)?;

    let maintenance = config.maintenance_url();
    let admin = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&maintenance)
        .await
        .with_context(|| {
            format!("failed to connect to maintenance database at {}", redact_url(&maintenance))
        })?;

    let result = create_if_missing(&admin, name, &create).await;
    admin.close().await;
    result
}

async fn create_if_missing(admin: &PgPool, name: &str, create: &str) -> Result<bool> {
    let present: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(admin)
            .await
            .context("failed to look up database in pg_database")?;
    if present {
        info!(db = name, "plan store database already exists");
        return Ok(false);
    }

    admin
        .execute(create)
        .await
        .with_context(|| format!("failed to create database {name}"))?;
    info!(db = name, "plan store database created");
    Ok(true)
}

/// `CREATE DATABASE` cannot take bind parameters, so only names made of
/// ASCII letters, digits and underscores are accepted.
fn create_database_statement(name: &str) -> Result<String> {
    let plain = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !plain {
        anyhow::bail!("database name {name:?} must be letters, digits or underscores");
    }
    Ok(format!("CREATE DATABASE {name}"))
}
