use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use sqlx::PgPool;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use stepwise_core::plan::{PlanEnvelope, PlanService};
use stepwise_db::queries::plans as plan_db;

/// Message used when a failure carries nothing more specific.
pub const FALLBACK_ERROR_MESSAGE: &str = "Failed to generate plan. Please try again.";

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PlanService>,
    /// `None` when persistence is not configured.
    pub pool: Option<PgPool>,
    pub expose_error_details: bool,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
            details: None,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
            details: None,
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.into(),
            details: None,
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
            details: None,
        }
    }

    /// A 500 whose `details` are only kept when `expose` is set.
    pub fn unexpected(message: impl Into<String>, details: String, expose: bool) -> Self {
        let message = message.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: if message.is_empty() {
                FALLBACK_ERROR_MESSAGE.to_string()
            } else {
                message
            },
            details: expose.then_some(details),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => serde_json::json!({ "error": self.message, "details": details }),
            None => serde_json::json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Turn a caught panic payload into the 500 envelope.
fn panic_response(panic: Box<dyn Any + Send + 'static>, expose: bool) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        FALLBACK_ERROR_MESSAGE.to_string()
    };
    tracing::error!(error = %message, "panic while handling request");
    AppError::unexpected(message.clone(), format!("panic: {message}"), expose).into_response()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub goal: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    let expose = state.expose_error_details;
    Router::new()
        .route("/api/plan", post(create_plan))
        .route("/api/plans", get(list_plans))
        .route("/api/plans/{id}", get(get_plan))
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
            panic_response(panic, expose)
        }))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("stepwise serve listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("stepwise serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for Ctrl+C");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_plan(
    State(state): State<AppState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<PlanEnvelope>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::error!(error = %rejection, "rejected plan request body");
        AppError::unexpected(
            rejection.body_text(),
            format!("{rejection:?}"),
            state.expose_error_details,
        )
    })?;

    let goal = request.goal.unwrap_or_default();
    let outcome = state
        .service
        .create_plan(&goal)
        .await
        .map_err(|err| AppError::bad_request(err.to_string()))?;

    Ok(Json(PlanEnvelope { plan: outcome.plan }))
}

fn require_pool(state: &AppState) -> Result<&PgPool, AppError> {
    state
        .pool
        .as_ref()
        .ok_or_else(|| AppError::unavailable("plan storage is not configured"))
}

async fn list_plans(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, AppError> {
    let pool = require_pool(&state)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let plans = plan_db::list_recent_plans(pool, limit)
        .await
        .map_err(AppError::internal)?;

    Ok(Json(plans).into_response())
}

async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let pool = require_pool(&state)?;
    let plan = plan_db::get_plan(pool, id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("plan {id} not found")))?;

    Ok(Json(plan).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
