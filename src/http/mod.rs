//! HTTP API server for external control
//!
//! This module provides a REST API for controlling subtitle sessions:
//! - POST /sessions/start - Start a new session
//! - POST /sessions/stop/:id - Stop a session
//! - GET /sessions/:id/status - Query session and translation statistics
//! - GET /sessions/:id/speakers - Per-speaker statistics
//! - DELETE /sessions/:id/speakers - Forget detected speakers
//! - POST /translate - One-shot test translation
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{
    ErrorResponse, StartSessionRequest, StartSessionResponse, StopSessionResponse,
    TranslateRequest,
};
pub use routes::create_router;
pub use state::AppState;
