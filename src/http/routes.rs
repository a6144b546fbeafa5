use super::handlers;
use super::state::ListenerState;
use axum::{routing::any, Router};
use tower_http::trace::TraceLayer;

/// Path carrying heart rate readings
pub const HEART_RATE_PATH: &str = "/heartrate";

/// Create the listener router
pub fn create_router(state: ListenerState) -> Router {
    Router::new()
        .route(HEART_RATE_PATH, any(handlers::heart_rate))
        // Anything else is acknowledged and ignored
        .fallback(handlers::acknowledge)
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
