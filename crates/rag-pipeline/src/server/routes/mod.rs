//! API routes for the RAG server

pub mod completion;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/chat/completion",
            post(completion::chat_completion).layer(DefaultBodyLimit::max(max_upload_size)),
        )
}
