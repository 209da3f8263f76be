//! Session lifecycle
//!
//! This module provides the `SessionController` that drives:
//! - Role selection (host or guest) and the per-attempt context
//! - Connection establishment through a `PeerTransport`
//! - Captioning start/stop around the active call
//! - Teardown, call summary and return to idle

mod config;
mod context;
mod controller;
mod handle;
mod id;
#[allow(clippy::module_inception)]
mod session;
mod state;
mod stats;

pub use config::ControllerConfig;
pub use context::{CaptioningState, SessionContext};
pub use controller::SessionController;
pub use handle::{Command, SessionHandle, SessionSnapshot};
pub use id::{generate_session_id, normalize_session_id, SessionIdSource};
pub use session::Session;
pub use state::{AttemptId, LifecycleState, Role};
pub use stats::{CallSummary, EndReason};
