use super::state::AppState;
use crate::sampler::{Permission, SamplerError};
use crate::session::{format_duration, Session, TrackerError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub granted: bool,
    pub permission: Permission,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StartTrackingResponse {
    pub session_id: String,
    pub start_time: i64,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopTrackingResponse {
    pub session_id: String,
    pub status: String,
    pub duration: String,
    pub message: String,
    pub session: Session,
}

#[derive(Debug, Serialize)]
pub struct DeleteSessionResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn status_for(err: &TrackerError) -> StatusCode {
    match err {
        TrackerError::Sampler(SamplerError::PermissionDenied) => StatusCode::FORBIDDEN,
        TrackerError::Sampler(SamplerError::AlreadyRecording)
        | TrackerError::AlreadyTracking
        | TrackerError::NotTracking => StatusCode::CONFLICT,
        TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
        TrackerError::Sampler(
            SamplerError::Acquisition(_)
            | SamplerError::InvalidConfig(_)
            | SamplerError::TaskFailed(_),
        )
        | TrackerError::Session(_)
        | TrackerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /permission
/// Probe microphone access
pub async fn request_permission(State(state): State<AppState>) -> impl IntoResponse {
    let mut tracker = state.tracker.lock().await;

    match tracker.request_access().await {
        Ok(granted) => {
            let message = if granted {
                "Microphone access granted!".to_string()
            } else {
                "Microphone access is required to track sleep noise".to_string()
            };
            let status = if granted {
                StatusCode::OK
            } else {
                StatusCode::FORBIDDEN
            };

            (
                status,
                Json(PermissionResponse {
                    granted,
                    permission: tracker.status().permission,
                    message,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to record permission: {}", e);
            error_response(status_for(&e), format!("Failed to record permission: {}", e))
        }
    }
}

/// POST /tracking/start
/// Open a session and start sampling
pub async fn start_tracking(State(state): State<AppState>) -> impl IntoResponse {
    let mut tracker = state.tracker.lock().await;

    match tracker.start_tracking().await {
        Ok(session) => {
            info!("Tracking started for session: {}", session.id());
            (
                StatusCode::OK,
                Json(StartTrackingResponse {
                    session_id: session.id().to_string(),
                    start_time: session.start_time(),
                    status: "tracking".to_string(),
                    message: "Sleep tracking started".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to start tracking: {}", e);
            error_response(status_for(&e), format!("Failed to start tracking: {}", e))
        }
    }
}

/// POST /tracking/stop
/// Stop sampling and return the completed session
pub async fn stop_tracking(State(state): State<AppState>) -> impl IntoResponse {
    let mut tracker = state.tracker.lock().await;

    match tracker.stop_tracking().await {
        Ok(session) => {
            info!("Tracking stopped for session: {}", session.id());
            (
                StatusCode::OK,
                Json(StopTrackingResponse {
                    session_id: session.id().to_string(),
                    status: "stopped".to_string(),
                    duration: format_duration(session.start_time(), session.end_time()),
                    message: session.quality_band().message().to_string(),
                    session,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to stop tracking: {}", e);
            error_response(status_for(&e), format!("Failed to stop tracking: {}", e))
        }
    }
}

/// GET /tracking/status
/// Live level, elapsed time and last error
pub async fn tracking_status(State(state): State<AppState>) -> impl IntoResponse {
    let tracker = state.tracker.lock().await;
    (StatusCode::OK, Json(tracker.status()))
}

/// GET /sessions
/// History summaries, newest first
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let tracker = state.tracker.lock().await;
    (StatusCode::OK, Json(tracker.summaries()))
}

/// GET /sessions/last
/// Most recent completed session
pub async fn last_session(State(state): State<AppState>) -> impl IntoResponse {
    let tracker = state.tracker.lock().await;

    match tracker.last_session() {
        Some(session) => (StatusCode::OK, Json(session.clone())).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No sessions recorded yet".to_string()),
    }
}

/// GET /sessions/:session_id
/// Full session with readings
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let tracker = state.tracker.lock().await;

    match tracker.session(&session_id) {
        Some(session) => (StatusCode::OK, Json(session.clone())).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        ),
    }
}

/// DELETE /sessions/:session_id
/// Remove a session from history
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let mut tracker = state.tracker.lock().await;

    match tracker.delete_session(&session_id) {
        Ok(()) => {
            info!("Session deleted: {}", session_id);
            (
                StatusCode::OK,
                Json(DeleteSessionResponse {
                    session_id,
                    status: "deleted".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            if !matches!(e, TrackerError::NotFound(_)) {
                error!("Failed to delete session {}: {}", session_id, e);
            }
            error_response(status_for(&e), format!("Failed to delete session: {}", e))
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
