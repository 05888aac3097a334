mod config;
mod plan_cmd;
mod serve_cmd;

use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use sqlx::PgPool;

use stepwise_core::generator::{GeminiClient, TextGenerator};
use stepwise_core::plan::{PlanService, SchemaVariant};
use stepwise_core::store::{PgPlanSink, PlanSink};
use stepwise_db::pool;
use stepwise_db::queries::plans as plan_db;

use config::{CliOverrides, StepwiseConfig};

#[derive(Parser)]
#[command(name = "stepwise", about = "Turn a free-text goal into a structured, ordered plan")]
struct Cli {
    /// Database URL (overrides STEPWISE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a stepwise config file (no database required)
    Init {
        /// PostgreSQL connection URL (omit to run without persistence)
        #[arg(long)]
        db_url: Option<String>,
        /// Gemini API key (omit to always synthesize plans locally)
        #[arg(long)]
        api_key: Option<String>,
        /// Plan schema: priority or emoji
        #[arg(long, default_value = "priority")]
        schema: SchemaVariant,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the stepwise database and run migrations
    DbInit,
    /// Serve the plan HTTP API
    Serve {
        /// Address to bind (default: 127.0.0.1)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (default: 3000)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Produce a plan for a goal and print it as JSON
    Plan {
        /// The goal to plan for
        goal: String,
        /// Skip the generator and synthesize locally
        #[arg(long)]
        offline: bool,
    },
    /// List recently stored plans
    History {
        /// Maximum number of plans to show (1-100)
        #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(i64).range(1..=100))]
        limit: i64,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Execute the `stepwise init` command: write config file.
fn cmd_init(
    db_url: Option<String>,
    api_key: Option<String>,
    schema: SchemaVariant,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection { url: db_url },
        generator: config::GeneratorSection {
            api_key,
            ..Default::default()
        },
        plan: config::PlanSection {
            schema: Some(schema),
        },
        server: config::ServerSection {
            bind: Some(config::DEFAULT_BIND.to_string()),
            port: Some(config::DEFAULT_PORT),
            expose_error_details: Some(false),
        },
    };

    config::save_config_to(&cfg, &path)?;

    println!("Config written to {}", path.display());
    match &cfg.database.url {
        Some(url) => println!("  database.url = {url}"),
        None => println!("  database.url = (unset, plans will not be saved)"),
    }
    match &cfg.generator.api_key {
        Some(key) => println!("  generator.api_key = {}", config::mask_secret(key)),
        None => println!("  generator.api_key = (unset, plans will be synthesized)"),
    }
    println!("  plan.schema = {schema}");
    if cfg.database.url.is_some() {
        println!();
        println!("Next: run `stepwise db-init` to create and migrate the database.");
    }

    Ok(())
}

/// Execute the `stepwise db-init` command: create database and run migrations.
async fn cmd_db_init(config: &StepwiseConfig) -> anyhow::Result<()> {
    let db_config = config.db_config_or_default();

    println!("Initializing stepwise database...");

    if pool::ensure_database_exists(&db_config).await? {
        println!("Created database at {}", db_config.redacted_url());
    }
    let db_pool = pool::create_pool(&db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = plan_db::count_plans(&db_pool).await?;
    println!("Database ready. Stored plans: {}", counts.total());
    println!("  generated: {}", counts.generated);
    println!("  synthesized: {}", counts.synthesized);

    db_pool.close().await;

    println!("stepwise db-init complete.");
    Ok(())
}

/// Connect to the configured database, if any. Connection failures are
/// logged and treated as "no persistence".
async fn connect_optional(config: &StepwiseConfig) -> Option<PgPool> {
    let db_config = config.db_config.as_ref()?;
    match pool::create_pool(db_config).await {
        Ok(db_pool) => Some(db_pool),
        Err(err) => {
            tracing::warn!(
                error = %format!("{err:#}"),
                "database unavailable, plans will not be saved"
            );
            None
        }
    }
}

/// Wire the generator and sink into a `PlanService`.
fn build_service(
    config: &StepwiseConfig,
    db_pool: Option<&PgPool>,
    offline: bool,
) -> anyhow::Result<PlanService> {
    let generator: Option<Arc<dyn TextGenerator>> = match &config.gemini {
        Some(gemini) if !offline => Some(Arc::new(
            GeminiClient::new(gemini.clone()).context("failed to build Gemini client")?,
        )),
        _ => None,
    };
    let sink: Option<Arc<dyn PlanSink>> = db_pool
        .cloned()
        .map(|p| Arc::new(PgPlanSink::new(p)) as Arc<dyn PlanSink>);

    tracing::debug!(
        generator = generator.as_deref().map(|g| g.name()),
        sink = sink.as_deref().map(|s| s.name()),
        schema = %config.schema,
        "plan service configured"
    );
    Ok(PlanService::new(generator, sink, config.schema))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut overrides = CliOverrides {
        database_url: cli.database_url.clone(),
        ..Default::default()
    };

    match cli.command {
        Commands::Init {
            db_url,
            api_key,
            schema,
            force,
        } => {
            cmd_init(db_url, api_key, schema, force)?;
        }
        Commands::DbInit => {
            let resolved = StepwiseConfig::resolve(&overrides)?;
            cmd_db_init(&resolved).await?;
        }
        Commands::Serve { bind, port } => {
            overrides.bind = bind;
            overrides.port = port;
            let resolved = StepwiseConfig::resolve(&overrides)?;
            let db_pool = connect_optional(&resolved).await;
            let service = build_service(&resolved, db_pool.as_ref(), false)?;
            let state = serve_cmd::AppState {
                service: Arc::new(service),
                pool: db_pool.clone(),
                expose_error_details: resolved.server.expose_error_details,
            };
            let result =
                serve_cmd::run_serve(state, &resolved.server.bind, resolved.server.port).await;
            if let Some(p) = db_pool {
                p.close().await;
            }
            result?;
        }
        Commands::Plan { goal, offline } => {
            let resolved = StepwiseConfig::resolve(&overrides)?;
            let db_pool = connect_optional(&resolved).await;
            let service = build_service(&resolved, db_pool.as_ref(), offline)?;
            let result = plan_cmd::run_plan(&service, &goal).await;
            if let Some(p) = db_pool {
                p.close().await;
            }
            result?;
        }
        Commands::History { limit } => {
            let resolved = StepwiseConfig::resolve(&overrides)?;
            let db_pool = pool::create_pool(&resolved.db_config_or_default()).await?;
            let result = plan_cmd::run_history(&db_pool, limit).await;
            db_pool.close().await;
            result?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "stepwise", &mut std::io::stdout());
        }
    }

    Ok(())
}
