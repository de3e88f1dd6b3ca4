use super::state::AppState;
use crate::error::TranslationError;
use crate::nats::spawn_event_publisher;
use crate::pipeline::{SessionStats, SubtitleSession};
use crate::translation::TranslationRequest;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartSessionRequest {
    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<String>,

    /// Overrides the configured target languages
    pub target_languages: Option<Vec<String>>,

    /// Initial recognition locale, e.g. "en-US"
    pub language: Option<String>,

    pub speaker_detection: Option<bool>,

    pub auto_switch_language: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopSessionResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
    pub stats: SessionStats,
}

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub text: String,

    /// Defaults to the configured target languages
    #[serde(default)]
    pub target_languages: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn session_not_found(session_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        format!("Session {} not found", session_id),
    )
}

async fn find_session(state: &AppState, session_id: &str) -> Option<Arc<SubtitleSession>> {
    state.sessions.read().await.get(session_id).cloned()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions/start
/// Start a new subtitle session
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    // Generate or use provided session ID
    let session_id = req
        .session_id
        .unwrap_or_else(|| format!("subtitles-{}", uuid::Uuid::new_v4()));

    info!("Starting subtitles for session: {}", session_id);

    // Check if already running
    if find_session(&state, &session_id).await.is_some() {
        return error_response(
            StatusCode::CONFLICT,
            format!("Session {} is already running", session_id),
        );
    }

    let mut config = state.config.session_config(session_id.clone());
    config.target_languages = req.target_languages;
    if let Some(enabled) = req.speaker_detection {
        config.speaker_detection = enabled;
    }
    if let Some(enabled) = req.auto_switch_language {
        config.auto_switch_language = enabled;
    }
    let language = req
        .language
        .unwrap_or_else(|| state.config.session.recognition_language.clone());

    let source = match state.sources.create(&session_id, &language).await {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to create recognition source: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to create recognition source: {}", e),
            );
        }
    };

    let session = Arc::new(SubtitleSession::new(
        config,
        Arc::clone(&state.context),
        source,
    ));

    if let Some(client) = &state.publisher {
        spawn_event_publisher(Arc::clone(client), session_id.clone(), session.subscribe());
    }

    // Start recognition
    if let Err(e) = session.start().await {
        error!("Failed to start session: {:#}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to start session: {:#}", e),
        );
    }

    // Store session
    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id.clone(), session);
    }

    info!("Subtitles started successfully for session: {}", session_id);

    (
        StatusCode::OK,
        Json(StartSessionResponse {
            session_id: session_id.clone(),
            status: "running".to_string(),
            message: format!("Subtitles started for session {}", session_id),
        }),
    )
        .into_response()
}

/// POST /sessions/stop/:session_id
/// Stop a subtitle session
pub async fn stop_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!("Stopping subtitles for session: {}", session_id);

    // Find and remove session
    let session = {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&session_id)
    };

    let Some(session) = session else {
        error!("Session {} not found", session_id);
        return session_not_found(&session_id);
    };

    match session.stop().await {
        Ok(stats) => {
            info!("Subtitles stopped successfully for session: {}", session_id);
            (
                StatusCode::OK,
                Json(StopSessionResponse {
                    session_id: session_id.clone(),
                    status: "stopped".to_string(),
                    message: "Subtitles stopped".to_string(),
                    stats,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to stop session: {:#}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to stop session: {:#}", e),
            )
        }
    }
}

/// GET /sessions/:session_id/status
/// Session statistics, including recognition state and translation health
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match find_session(&state, &session_id).await {
        Some(session) => (StatusCode::OK, Json(session.stats().await)).into_response(),
        None => session_not_found(&session_id),
    }
}

/// GET /sessions/:session_id/speakers
/// Per-speaker statistics
pub async fn get_speakers(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match find_session(&state, &session_id).await {
        Some(session) => (StatusCode::OK, Json(session.speakers().await)).into_response(),
        None => session_not_found(&session_id),
    }
}

/// DELETE /sessions/:session_id/speakers
/// Forget all detected speakers
pub async fn clear_speakers(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match find_session(&state, &session_id).await {
        Some(session) => {
            session.clear_speakers().await;
            StatusCode::NO_CONTENT.into_response()
        }
        None => session_not_found(&session_id),
    }
}

/// POST /translate
/// One-shot translation, e.g. to test provider credentials
pub async fn translate(
    State(state): State<AppState>,
    Json(req): Json<TranslateRequest>,
) -> impl IntoResponse {
    let targets = req
        .target_languages
        .unwrap_or_else(|| state.context.config().target_languages.clone());

    match state
        .orchestrator
        .translate(TranslationRequest::adhoc(req.text, targets))
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e @ TranslationError::EmptyText) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            error!("Test translation failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
