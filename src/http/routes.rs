//! HTTP API route definitions

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/profile/:identifier", get(handlers::profile))
        // Legacy route kept for existing clients
        .route("/user", post(handlers::user))
        .with_state(state);

    Router::new().nest("/api", api)
}
