use std::collections::HashSet;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{TrackListing, TrackRecord};
use crate::services::catalog::Catalog;
use crate::services::engine::RecommendationEngine;

/// How a recommendation batch is seeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Neighborhood of a single anchor track, title-deduplicated and
    /// tag-filtered against the anchor
    ByTrack { track_id: Uuid },
    /// Union of the neighborhoods of every track the user liked
    ByLikes { user_id: Uuid },
    /// Like-based when the user has likes, genre-preference listing otherwise
    ByUser { user_id: Uuid, limit: usize },
}

/// Resolves a strategy to a recommendation listing
pub async fn recommend(
    engine: &RecommendationEngine,
    catalog: &dyn Catalog,
    strategy: Strategy,
    k: usize,
) -> AppResult<TrackListing> {
    let tracks = match strategy {
        Strategy::ByTrack { track_id } => {
            return recommend_by_track(engine, catalog, track_id, k).await
        }
        Strategy::ByLikes { user_id } => recommend_by_likes(engine, catalog, user_id, k).await?,
        Strategy::ByUser { user_id, limit } => {
            recommend_by_user(engine, catalog, user_id, k, limit).await?
        }
    };
    Ok(TrackListing::from(tracks))
}

/// Builds a title-unique, catalog-resolved batch around one anchor track.
///
/// Repeatedly queries the engine, excluding every id whose resolved title
/// collided with another title in the same batch, until a collision-free
/// batch comes back or the pool runs dry. Each retry strictly grows the
/// exclusion set, so the loop converges; a hard cap at the catalog size
/// turns any residual risk into a logged best-effort outcome instead of
/// an infinite loop.
///
/// The final batch carries only the tags each track shares with the anchor.
pub async fn recommend_by_track(
    engine: &RecommendationEngine,
    catalog: &dyn Catalog,
    track_id: Uuid,
    k: usize,
) -> AppResult<TrackListing> {
    let anchor = catalog
        .resolve_tracks(&[track_id])
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::UnknownTrack(track_id))?;
    let anchor_tags: HashSet<String> = normalized_tags(&anchor).into_iter().collect();

    let mut excluded: HashSet<Uuid> = HashSet::new();
    let mut batch: Vec<TrackRecord> = Vec::new();
    let max_attempts = engine.catalog_size().max(1);
    let mut capped = true;

    for attempt in 1..=max_attempts {
        let ids = engine.recommend(track_id, &excluded, k)?;
        if ids.is_empty() {
            // Pool exhausted; whatever batch the previous attempt left
            // behind is the best we can do.
            capped = false;
            break;
        }

        let tracks = catalog.resolve_tracks(&ids).await?;

        let mut seen_titles: HashSet<String> = HashSet::new();
        let mut colliding: Vec<Uuid> = Vec::new();
        let mut deduped: Vec<TrackRecord> = Vec::new();
        for track in tracks {
            if seen_titles.insert(track.title.clone()) {
                deduped.push(track);
            } else {
                colliding.push(track.id);
            }
        }

        if colliding.is_empty() {
            batch = deduped;
            capped = false;
            break;
        }

        tracing::debug!(
            track_id = %track_id,
            attempt,
            duplicates = colliding.len(),
            "Duplicate titles in recommendation batch, retrying"
        );
        excluded.extend(colliding.iter().copied());
        // Keep the first-seen-per-title survivors as the fallback in case
        // the pool runs out before a clean batch appears.
        batch = deduped;
    }

    if capped {
        tracing::warn!(
            track_id = %track_id,
            attempts = max_attempts,
            "Recommendation retries exhausted, returning best-effort batch"
        );
    }

    for track in &mut batch {
        let shared: Vec<String> = normalized_tags(track)
            .into_iter()
            .filter(|tag| anchor_tags.contains(tag))
            .collect();
        track.tags = Some(shared);
    }

    tracing::info!(
        track_id = %track_id,
        count = batch.len(),
        "Track recommendations assembled"
    );
    Ok(TrackListing::from(batch))
}

/// Unions the engine neighborhoods of every liked track.
///
/// Each liked track seeds an independent engine call with an empty
/// exclusion set; results are de-duplicated by id and by resolved title
/// across all seeds. An empty result signals the caller to fall back.
pub async fn recommend_by_likes(
    engine: &RecommendationEngine,
    catalog: &dyn Catalog,
    user_id: Uuid,
    k: usize,
) -> AppResult<Vec<TrackRecord>> {
    let liked = catalog.liked_track_ids(user_id).await?;
    if liked.is_empty() {
        tracing::debug!(user_id = %user_id, "User has no liked tracks");
        return Ok(Vec::new());
    }

    let no_exclusions = HashSet::new();
    let mut seen_ids: HashSet<Uuid> = HashSet::new();
    let mut candidate_ids: Vec<Uuid> = Vec::new();
    for seed in &liked {
        let ids = match engine.recommend(*seed, &no_exclusions, k) {
            Ok(ids) => ids,
            Err(AppError::UnknownTrack(id)) => {
                // A catalog row can exist before its embeddings are deployed;
                // one stale like must not fail the whole request.
                tracing::warn!(track_id = %id, "Liked track missing from embedding store, skipping seed");
                continue;
            }
            Err(e) => return Err(e),
        };
        for id in ids {
            if seen_ids.insert(id) {
                candidate_ids.push(id);
            }
        }
    }

    let tracks = catalog.resolve_tracks(&candidate_ids).await?;
    let mut seen_titles: HashSet<String> = HashSet::new();
    let recommendations: Vec<TrackRecord> = tracks
        .into_iter()
        .filter(|track| seen_titles.insert(track.title.clone()))
        .collect();

    tracing::info!(
        user_id = %user_id,
        seeds = liked.len(),
        count = recommendations.len(),
        "Like-based recommendations assembled"
    );
    Ok(recommendations)
}

/// Like-based recommendations with a genre-preference fallback.
///
/// The fallback is a plain filtered listing from the catalog, no
/// similarity scoring involved.
pub async fn recommend_by_user(
    engine: &RecommendationEngine,
    catalog: &dyn Catalog,
    user_id: Uuid,
    k: usize,
    limit: usize,
) -> AppResult<Vec<TrackRecord>> {
    let like_based = recommend_by_likes(engine, catalog, user_id, k).await?;
    if !like_based.is_empty() {
        return Ok(like_based);
    }

    let genres = catalog.preferred_genres(user_id).await?;
    tracing::debug!(
        user_id = %user_id,
        genres = genres.len(),
        "Falling back to genre-preference listing"
    );
    catalog.tracks_by_genres(&genres, limit).await
}

fn normalized_tags(track: &TrackRecord) -> Vec<String> {
    track
        .tags
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|tag| tag.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingStore;
    use crate::services::catalog::MockCatalog;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn track(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    /// Four tracks with known score ordering against track 1:
    /// track2 (1.0) > track3 (~0.82) > track4 (0.4).
    fn fixture_engine() -> RecommendationEngine {
        let content = vec![
            vec![1.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
        ];
        let labels = vec![track(1), track(2), track(3), track(4)];
        let metadata = HashMap::from([
            (track(1), vec![1.0, 1.0]),
            (track(2), vec![1.0, 1.0]),
            (track(3), vec![1.0, 1.0]),
            (track(4), vec![1.0, 1.0]),
        ]);
        let store = EmbeddingStore::new(content, labels, metadata).unwrap();
        RecommendationEngine::new(Arc::new(store))
    }

    fn record(id: Uuid, title: &str, tags: Option<Vec<&str>>) -> TrackRecord {
        TrackRecord {
            id,
            title: title.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            genre: "Pop".to_string(),
            cover_art: None,
            mp3_url: None,
            tags: tags.map(|tags| tags.into_iter().map(str::to_string).collect()),
            release_date: None,
        }
    }

    fn catalog_with(records: Vec<TrackRecord>) -> MockCatalog {
        let by_id: HashMap<Uuid, TrackRecord> =
            records.into_iter().map(|r| (r.id, r)).collect();
        let mut catalog = MockCatalog::new();
        catalog.expect_resolve_tracks().returning(move |ids| {
            Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
        });
        catalog
    }

    #[tokio::test]
    async fn test_by_track_retries_on_title_collision() {
        let engine = fixture_engine();
        // track2 and track3 resolve to the same title; the lower-scoring one
        // must be excluded and the engine consulted again.
        let catalog = catalog_with(vec![
            record(track(1), "Anchor", Some(vec!["chill", "upbeat"])),
            record(track(2), "Same Song", Some(vec!["upbeat", "loud"])),
            record(track(3), "Same Song", None),
            record(track(4), "Other", None),
        ]);

        let listing = recommend_by_track(&engine, &catalog, track(1), 5)
            .await
            .unwrap();

        let ids: Vec<Uuid> = listing.tracks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![track(2), track(4)]);
        assert_eq!(listing.total_entries, 2);
    }

    #[tokio::test]
    async fn test_by_track_intersects_tags_with_anchor() {
        let engine = fixture_engine();
        let catalog = catalog_with(vec![
            record(track(1), "Anchor", Some(vec!["chill", "upbeat"])),
            record(track(2), "Two", Some(vec![" upbeat ", "loud"])),
            record(track(3), "Three", Some(vec!["chill"])),
            record(track(4), "Four", None),
        ]);

        let listing = recommend_by_track(&engine, &catalog, track(1), 5)
            .await
            .unwrap();

        assert_eq!(listing.tracks[0].tags, Some(vec!["upbeat".to_string()]));
        assert_eq!(listing.tracks[1].tags, Some(vec!["chill".to_string()]));
        assert_eq!(listing.tracks[2].tags, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_by_track_unknown_anchor_in_catalog() {
        let engine = fixture_engine();
        let catalog = catalog_with(Vec::new());

        let err = recommend_by_track(&engine, &catalog, track(1), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownTrack(id) if id == track(1)));
    }

    #[tokio::test]
    async fn test_by_track_empty_pool_yields_empty_listing() {
        // Single-track store: the engine has no candidates to offer.
        let content = vec![vec![1.0, 0.0]];
        let labels = vec![track(1)];
        let metadata = HashMap::from([(track(1), vec![1.0])]);
        let store = EmbeddingStore::new(content, labels, metadata).unwrap();
        let engine = RecommendationEngine::new(Arc::new(store));

        let catalog = catalog_with(vec![record(track(1), "Anchor", None)]);
        let listing = recommend_by_track(&engine, &catalog, track(1), 5)
            .await
            .unwrap();
        assert_eq!(listing.total_entries, 0);
        assert!(listing.tracks.is_empty());
    }

    #[tokio::test]
    async fn test_by_likes_unions_and_dedups_across_seeds() {
        let engine = fixture_engine();
        let mut catalog = catalog_with(vec![
            record(track(1), "One", None),
            record(track(2), "Dup", None),
            record(track(3), "Dup", None),
            record(track(4), "Four", None),
        ]);
        catalog
            .expect_liked_track_ids()
            .returning(|_| Ok(vec![track(1), track(2)]));

        let recommendations = recommend_by_likes(&engine, &catalog, track(77), 5)
            .await
            .unwrap();

        // Seed 1 yields [2, 3, 4], seed 2 adds [1]; track3 shares track2's
        // title and is dropped.
        let ids: Vec<Uuid> = recommendations.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![track(2), track(4), track(1)]);
    }

    #[tokio::test]
    async fn test_by_likes_skips_seed_missing_from_store() {
        let engine = fixture_engine();
        let mut catalog = catalog_with(vec![
            record(track(2), "Two", None),
            record(track(3), "Three", None),
            record(track(4), "Four", None),
        ]);
        catalog
            .expect_liked_track_ids()
            .returning(|_| Ok(vec![track(99), track(1)]));

        let recommendations = recommend_by_likes(&engine, &catalog, track(77), 5)
            .await
            .unwrap();
        let ids: Vec<Uuid> = recommendations.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![track(2), track(3), track(4)]);
    }

    #[tokio::test]
    async fn test_by_likes_without_likes_is_empty() {
        let engine = fixture_engine();
        let mut catalog = MockCatalog::new();
        catalog.expect_liked_track_ids().returning(|_| Ok(Vec::new()));

        let recommendations = recommend_by_likes(&engine, &catalog, track(77), 5)
            .await
            .unwrap();
        assert!(recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_by_user_falls_back_to_genre_preferences() {
        let engine = fixture_engine();
        let mut catalog = MockCatalog::new();
        catalog.expect_liked_track_ids().returning(|_| Ok(Vec::new()));
        catalog
            .expect_preferred_genres()
            .returning(|_| Ok(vec!["Rock".to_string()]));
        catalog
            .expect_tracks_by_genres()
            .withf(|genres, limit| genres.len() == 1 && genres[0] == "Rock" && *limit == 10)
            .returning(|_, _| Ok(vec![record(track(4), "Fallback", None)]));

        let recommendations = recommend_by_user(&engine, &catalog, track(77), 5, 10)
            .await
            .unwrap();
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].title, "Fallback");
    }

    #[tokio::test]
    async fn test_by_user_prefers_like_based_results() {
        let engine = fixture_engine();
        let mut catalog = catalog_with(vec![
            record(track(2), "Two", None),
            record(track(3), "Three", None),
            record(track(4), "Four", None),
        ]);
        catalog
            .expect_liked_track_ids()
            .returning(|_| Ok(vec![track(1)]));
        // The fallback path must never run.
        catalog.expect_preferred_genres().times(0);
        catalog.expect_tracks_by_genres().times(0);

        let recommendations = recommend_by_user(&engine, &catalog, track(77), 5, 10)
            .await
            .unwrap();
        assert_eq!(recommendations.len(), 3);
    }

    #[tokio::test]
    async fn test_dispatch_wraps_like_based_results() {
        let engine = fixture_engine();
        let mut catalog = catalog_with(vec![
            record(track(2), "Two", None),
            record(track(3), "Three", None),
            record(track(4), "Four", None),
        ]);
        catalog
            .expect_liked_track_ids()
            .returning(|_| Ok(vec![track(1)]));

        let listing = recommend(
            &engine,
            &catalog,
            Strategy::ByLikes { user_id: track(77) },
            5,
        )
        .await
        .unwrap();
        assert_eq!(listing.total_entries, 3);
    }
}
