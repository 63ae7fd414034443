use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Question to executed result
            .route("/ask", post(handlers::api::ask))
            // Conversation history
            .route("/history/{session_id}", get(handlers::api::history))
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
