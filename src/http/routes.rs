use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Role selection
        .route("/session/host", post(handlers::host_session))
        .route("/session/join/:session_id", post(handlers::join_session))
        // In-call controls
        .route("/session/hangup", post(handlers::hangup))
        .route("/session/abort", post(handlers::abort))
        .route("/session/acknowledge", post(handlers::acknowledge))
        .route("/session/mic/toggle", post(handlers::toggle_mic))
        .route("/session/deaf/toggle", post(handlers::toggle_deaf))
        .route("/session/chat", post(handlers::post_chat))
        // Queries
        .route("/session/status", get(handlers::get_status))
        .route("/session/transcript", get(handlers::get_transcript))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // Browser front-ends run on another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}
