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
        // Onboarding
        .route("/permission", post(handlers::request_permission))
        // Tracking control
        .route("/tracking/start", post(handlers::start_tracking))
        .route("/tracking/stop", post(handlers::stop_tracking))
        .route("/tracking/status", get(handlers::tracking_status))
        // History
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/last", get(handlers::last_session))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
