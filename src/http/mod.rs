//! HTTP API server for external control
//!
//! This module exposes the session controller over REST:
//! - POST /session/host - Open a channel as host
//! - POST /session/join/:session_id - Join a channel as guest
//! - POST /session/hangup, /session/abort, /session/acknowledge - End or reset
//! - POST /session/mic/toggle, /session/deaf/toggle - Local audio controls
//! - POST /session/chat - Send a typed line over the side-channel
//! - GET /session/status - Current session snapshot
//! - GET /session/transcript - Shared transcript so far
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
