use std::collections::HashSet;

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub track_id: Uuid,
    /// Track ids the caller has already seen; duplicates are tolerated
    #[serde(default)]
    pub existed_ids: Vec<Uuid>,
}

/// Handler for the raw engine endpoint
///
/// Returns bare track ids ordered best-first; resolution to full records
/// is the caller's business.
pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> AppResult<Json<Vec<Uuid>>> {
    let excluded: HashSet<Uuid> = request.existed_ids.iter().copied().collect();
    let ids = state
        .engine
        .recommend(request.track_id, &excluded, state.top_k)?;

    tracing::info!(
        track_id = %request.track_id,
        excluded = excluded.len(),
        count = ids.len(),
        "Engine recommendation served"
    );
    Ok(Json(ids))
}
