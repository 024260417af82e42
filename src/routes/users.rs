use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::CacheKey;
use crate::error::AppResult;
use crate::models::TrackListing;
use crate::routes::AppState;
use crate::services::recommendations::{self, Strategy};

// Likes move frequently; keep user-level results fresh.
const USER_CACHE_TTL: u64 = 300;

const DEFAULT_USER_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct UserRecommendationsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_USER_LIMIT
}

/// Handler for like-seeded recommendations
pub async fn recommendations_by_likes(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<TrackListing>> {
    let listing = recommendations::recommend(
        state.engine.as_ref(),
        state.catalog.as_ref(),
        Strategy::ByLikes { user_id },
        state.top_k,
    )
    .await?;
    Ok(Json(listing))
}

/// Handler for user recommendations with the preference fallback
pub async fn recommendations_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<UserRecommendationsQuery>,
) -> AppResult<Json<TrackListing>> {
    let key = CacheKey::UserRecommendations {
        user_id,
        limit: params.limit,
    };
    if let Some(cached) = state.cache.get::<TrackListing>(&key).await {
        tracing::debug!(user_id = %user_id, "Serving user recommendations from cache");
        return Ok(Json(cached));
    }

    let listing = recommendations::recommend(
        state.engine.as_ref(),
        state.catalog.as_ref(),
        Strategy::ByUser {
            user_id,
            limit: params.limit,
        },
        state.top_k,
    )
    .await?;

    state.cache.put_in_background(&key, &listing, USER_CACHE_TTL);
    Ok(Json(listing))
}
