use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::db::CacheKey;
use crate::error::AppResult;
use crate::models::TrackListing;
use crate::routes::AppState;
use crate::services::recommendations::{self, Strategy};

// Recommendations only move when the embedding artifacts are redeployed,
// so an hour of staleness is acceptable.
const TRACK_CACHE_TTL: u64 = 3600;

/// Handler for track-seeded recommendations
pub async fn recommendations_by_track(
    State(state): State<AppState>,
    Path(track_id): Path<Uuid>,
) -> AppResult<Json<TrackListing>> {
    let key = CacheKey::TrackRecommendations(track_id);
    if let Some(cached) = state.cache.get::<TrackListing>(&key).await {
        tracing::debug!(track_id = %track_id, "Serving track recommendations from cache");
        return Ok(Json(cached));
    }

    let listing = recommendations::recommend(
        state.engine.as_ref(),
        state.catalog.as_ref(),
        Strategy::ByTrack { track_id },
        state.top_k,
    )
    .await?;

    state.cache.put_in_background(&key, &listing, TRACK_CACHE_TTL);
    Ok(Json(listing))
}
