pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::resume::handlers;
use crate::state::AppState;

/// Room for multipart boundaries and the small form fields around the PDF.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Resume Q&A API
        .route(
            "/api/v1/resume/process",
            post(handlers::handle_process).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/v1/resume/reprocess", post(handlers::handle_reprocess))
        .route("/api/v1/resume/search", post(handlers::handle_search))
        .route("/api/v1/resume/ask", post(handlers::handle_ask))
        .route("/api/v1/resume/stats", get(handlers::handle_stats))
        .route("/api/v1/resume", delete(handlers::handle_clear))
        .with_state(state)
}
