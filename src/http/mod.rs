//! HTTP API for driving the tracker from a UI
//!
//! This module provides a REST API mirroring the app screens:
//! - POST /permission - Probe microphone access (onboarding)
//! - POST /tracking/start - Open a session and start sampling
//! - POST /tracking/stop - Close, summarize and store the session
//! - GET /tracking/status - Live level and elapsed time
//! - GET /sessions - History, newest first
//! - GET /sessions/last - Most recent night (dashboard)
//! - GET /sessions/:id - Full session with readings
//! - DELETE /sessions/:id - Remove a session
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
