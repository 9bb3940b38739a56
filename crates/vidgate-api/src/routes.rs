//! Route table and shared HTTP layers.

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api_doc::ApiDoc;
use crate::handlers::{assets, uploads};
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    // Chunk bodies are the largest requests; leave headroom over the
    // configured chunk size.
    let body_limit = (state.config.chunk_size as usize).saturating_mul(2);

    Router::new()
        .route("/api/v0/uploads", post(uploads::init_upload))
        .route(
            "/api/v0/uploads/{upload_id}/chunks/{chunk_number}",
            put(uploads::upload_chunk),
        )
        .route("/api/v0/uploads/{upload_id}", get(uploads::get_upload_status))
        .route("/api/v0/assets/{asset_id}", get(assets::get_asset))
        .route("/health", get(health))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
