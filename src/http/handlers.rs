use super::state::AppState;
use crate::error::{Result, SessionError};
use crate::session::SessionSnapshot;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    /// User-facing explanation
    pub message: String,
}

fn status_for(error: &SessionError) -> StatusCode {
    match error {
        SessionError::InvalidState { .. } | SessionError::RoleMismatch { .. } => StatusCode::CONFLICT,
        SessionError::InvalidSessionId(_) => StatusCode::BAD_REQUEST,
        SessionError::PeerUnavailable(_) => StatusCode::NOT_FOUND,
        SessionError::CapabilityDenied => StatusCode::FORBIDDEN,
        SessionError::Signaling(_) | SessionError::RegistrationFailed { .. } => StatusCode::BAD_GATEWAY,
        SessionError::ControllerGone => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(result: Result<SessionSnapshot>) -> Response {
    match result {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => {
            let status = status_for(&e);
            warn!("Request rejected ({}): {}", status, e);
            (
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                    message: e.user_message(),
                }),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/host
/// Register a fresh channel id and wait for a guest
pub async fn host_session(State(state): State<AppState>) -> Response {
    info!("Host requested over HTTP");
    respond(state.session.host().await)
}

/// POST /session/join/:session_id
/// Join an existing channel as guest
pub async fn join_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    info!("Join {} requested over HTTP", session_id);
    respond(state.session.join(session_id).await)
}

/// POST /session/hangup
pub async fn hangup(State(state): State<AppState>) -> Response {
    respond(state.session.hangup().await)
}

/// POST /session/abort
pub async fn abort(State(state): State<AppState>) -> Response {
    respond(state.session.abort().await)
}

/// POST /session/acknowledge
/// Dismiss the call summary
pub async fn acknowledge(State(state): State<AppState>) -> Response {
    respond(state.session.acknowledge().await)
}

/// POST /session/mic/toggle
pub async fn toggle_mic(State(state): State<AppState>) -> Response {
    respond(state.session.toggle_mic().await)
}

/// POST /session/deaf/toggle
pub async fn toggle_deaf(State(state): State<AppState>) -> Response {
    respond(state.session.toggle_deaf().await)
}

/// POST /session/chat
pub async fn post_chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    respond(state.session.chat(req.text).await)
}

/// GET /session/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.session.snapshot()))
}

/// GET /session/transcript
/// Shared transcript accumulated so far
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.session.snapshot().transcript))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
