//! Gateway route definitions

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the gateway router
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/query", get(handlers::query))
        .route("/upload", post(handlers::upload))
        .with_state(app_state)
}
