use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Cache;
use crate::middleware::request_id;
use crate::services::catalog::Catalog;
use crate::services::engine::RecommendationEngine;

pub mod recommend;
pub mod tracks;
pub mod users;

/// Shared application state
///
/// The engine holds the immutable embedding store; the catalog is the
/// only door to the relational side.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    pub catalog: Arc<dyn Catalog>,
    pub cache: Cache,
    pub top_k: usize,
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // The request-id layer sits outside the trace layer so every request
    // span carries the resolved correlation id.
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http().make_span_with(request_id::make_span))
        .layer(axum::middleware::from_fn(request_id::request_id))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/recommend", post(recommend::recommend))
        .route(
            "/tracks/:track_id/recommendations",
            get(tracks::recommendations_by_track),
        )
        .route(
            "/users/:user_id/recommendations/likes",
            get(users::recommendations_by_likes),
        )
        .route(
            "/users/:user_id/recommendations",
            get(users::recommendations_by_user),
        )
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
