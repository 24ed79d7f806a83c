use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize;

    Router::new()
        // Files
        .route("/files", post(handlers::create_file))
        .route("/files/:id", get(handlers::get_file))
        .route(
            "/upload_blob/:id",
            put(handlers::upload_blob).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/download/:id", get(handlers::download))
        .route("/search", get(handlers::search))
        // Audit
        .route("/audit", get(handlers::list_audit))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .route("/_internal/indexes", get(handlers::index_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
