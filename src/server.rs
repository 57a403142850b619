//! Axum server wiring: routes, boundary validation, middleware, sweep task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::generator::{GeneratorSettings, InstructionGenerator};
use crate::limit::{RateLimiter, rate_limit_middleware};
use crate::pipeline::{CreatedSession, ExplorationService, InstructionResponse, SessionList};
use crate::session::SessionStore;

/// Start the server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, settings: GeneratorSettings) -> anyhow::Result<()> {
    info!(
        name: "generator.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        "Generator configuration loaded"
    );

    let generator = Arc::new(InstructionGenerator::new(settings)?);
    let service = Arc::new(ExplorationService::new(SessionStore::new(), generator));
    let limiter = Arc::new(RateLimiter::new(
        config.limit.max_requests,
        Duration::from_secs(config.limit.window_secs),
    ));

    // Expiry sweep, independent of request handling.
    let sweep_store = service.sessions().clone();
    let session_timeout = Duration::from_secs(config.session.timeout_secs);
    let sweep_interval = Duration::from_secs(config.session.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            sweep_store.sweep_expired(session_timeout);
        }
    });

    let state = AppState {
        service,
        limiter,
        config: config.clone(),
    };

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        environment = %config.server.environment,
        "Server started"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Build the application router over the given state.
///
/// Factored out of [`start_server`] so integration tests can mount the full
/// middleware stack without binding a socket.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/explorations/sessions", post(create_session))
        .route(
            "/explorations/{session_id}/instruction",
            get(fetch_instruction),
        )
        .route("/explorations/{session_id}", get(session_detail))
        .route("/explorations/{session_id}", delete(delete_session))
        .route("/explorations", get(list_sessions))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Boundary validation
// ─────────────────────────────────────────────────────────────────────────────

const MIN_LOCATION_LEN: usize = 2;
const MAX_LOCATION_LEN: usize = 200;

/// Check a supplied location against the 2–200 character contract.
fn validate_location(location: &str) -> Result<(), ApiError> {
    if location.chars().count() < MIN_LOCATION_LEN {
        return Err(ApiError::InvalidLocation(format!(
            "Location must be at least {MIN_LOCATION_LEN} characters long"
        )));
    }
    if location.chars().count() > MAX_LOCATION_LEN {
        return Err(ApiError::InvalidLocation(format!(
            "Location must not exceed {MAX_LOCATION_LEN} characters"
        )));
    }
    Ok(())
}

/// Reject path ids that are not hyphenated UUID-v4 text before they reach
/// the pipeline.
fn validate_session_id(id: &str) -> Result<(), ApiError> {
    let ok = id.len() == 36
        && Uuid::try_parse(id).is_ok_and(|u| u.get_version_num() == 4);
    if ok {
        Ok(())
    } else {
        Err(ApiError::InvalidSessionId(id.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for session creation.
#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

/// POST /explorations/sessions - Create a session.
async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreatedSession>), ApiError> {
    let location = match req.location {
        Some(l) if !l.is_empty() => l,
        _ => return Err(ApiError::MissingLocation),
    };
    validate_location(&location)?;

    let created = state.service.create_session(location, req.metadata);
    info!(session_id = %created.session_id, "Session created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Query parameters for the instruction endpoint.
#[derive(Debug, Deserialize)]
struct InstructionQuery {
    #[serde(default)]
    location: Option<String>,
}

/// GET /explorations/:sessionId/instruction - Generate the next instruction.
async fn fetch_instruction(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<InstructionQuery>,
) -> Result<Json<InstructionResponse>, ApiError> {
    validate_session_id(&session_id)?;
    if let Some(location) = &query.location {
        validate_location(location)?;
    }

    let resp = state
        .service
        .fetch_instruction(&session_id, query.location)
        .await?;
    Ok(Json(resp))
}

/// GET /explorations/:sessionId - Session detail with full history.
async fn session_detail(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_session_id(&session_id)?;
    let detail = state.service.session_detail(&session_id)?;
    Ok(Json(detail))
}

/// DELETE /explorations/:sessionId - Remove a session.
async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    validate_session_id(&session_id)?;
    state.service.delete_session(&session_id)?;
    info!(session_id = %session_id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /explorations - Summaries of all live sessions.
async fn list_sessions(State(state): State<AppState>) -> Json<SessionList> {
    Json(state.service.list_sessions())
}

/// Health report body.
#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    timestamp: chrono::DateTime<Utc>,
    environment: String,
}

/// GET /health - Liveness report.
async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        timestamp: Utc::now(),
        environment: state.config.server.environment.clone(),
    })
}

/// Fallback body for unmatched routes.
#[derive(Debug, Serialize)]
struct NotFoundBody {
    error: &'static str,
    code: &'static str,
    path: String,
}

async fn not_found(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundBody {
            error: "Endpoint not found",
            code: "NOT_FOUND",
            path: uri.path().to_string(),
        }),
    )
}
