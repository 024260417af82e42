use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::embeddings::similarity::{blended_score, cosine_similarity};
use crate::embeddings::EmbeddingStore;
use crate::error::{AppError, AppResult};

/// Number of candidates returned per engine call unless overridden
pub const DEFAULT_TOP_K: usize = 5;

/// A candidate track with its blended similarity score.
///
/// `position` is the candidate's index in the embedding store and doubles
/// as the deterministic tie-breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub position: usize,
    pub track_id: Uuid,
    pub score: f32,
}

/// Reduces scored candidates to the `k` best eligible track ids.
///
/// Candidates are ranked by descending score with ties broken by ascending
/// store position, then taken in order skipping exclusions and ids already
/// picked (repeated labels in the store collapse to one result entry).
/// The result may be shorter than `k` when the pool runs out; that is a
/// valid outcome, not an error.
pub fn select_top_k(
    mut candidates: Vec<ScoredCandidate>,
    excluded: &HashSet<Uuid>,
    k: usize,
) -> Vec<Uuid> {
    candidates.sort_unstable_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.position.cmp(&b.position))
    });

    let mut picked = Vec::with_capacity(k.min(candidates.len()));
    let mut taken: HashSet<Uuid> = HashSet::new();
    for candidate in candidates {
        if picked.len() == k {
            break;
        }
        if excluded.contains(&candidate.track_id) || !taken.insert(candidate.track_id) {
            continue;
        }
        picked.push(candidate.track_id);
    }

    picked
}

/// Similarity-based recommendation engine over the embedding store.
///
/// A pure function of `(store, anchor, exclusions, k)`: the store is
/// read-only, so any number of requests may score concurrently.
pub struct RecommendationEngine {
    store: Arc<EmbeddingStore>,
}

impl RecommendationEngine {
    pub fn new(store: Arc<EmbeddingStore>) -> Self {
        Self { store }
    }

    /// Catalog size at load time; the orchestrator uses this to bound its
    /// retry loop.
    pub fn catalog_size(&self) -> usize {
        self.store.len()
    }

    /// Scores every non-anchor track in the store against the anchor.
    ///
    /// Fails with `UnknownTrack` when the anchor is absent. A candidate
    /// whose similarity is undefined in either space (zero-norm vector)
    /// scores the sentinel minimum and therefore sorts last.
    pub fn score_candidates(&self, track_id: Uuid) -> AppResult<Vec<ScoredCandidate>> {
        let (anchor_content, anchor_metadata) = self
            .store
            .vectors_for(&track_id)
            .ok_or(AppError::UnknownTrack(track_id))?;

        let mut scored = Vec::with_capacity(self.store.len().saturating_sub(1));
        for (position, label, content) in self.store.entries() {
            if label == track_id {
                continue;
            }

            let content_sim = cosine_similarity(anchor_content, content);
            let metadata_sim = self
                .store
                .metadata_vector(&label)
                .and_then(|metadata| cosine_similarity(anchor_metadata, metadata));

            scored.push(ScoredCandidate {
                position,
                track_id: label,
                score: blended_score(content_sim, metadata_sim),
            });
        }

        Ok(scored)
    }

    /// Returns up to `k` track ids most similar to `track_id`, skipping the
    /// anchor itself and everything in `excluded`, ordered best-first.
    pub fn recommend(
        &self,
        track_id: Uuid,
        excluded: &HashSet<Uuid>,
        k: usize,
    ) -> AppResult<Vec<Uuid>> {
        let scored = self.score_candidates(track_id)?;
        Ok(select_top_k(scored, excluded, k))
    }
}
