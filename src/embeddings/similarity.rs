//! Similarity primitives for the recommendation engine.
//!
//! Tracks live in two embedding spaces: a content space derived from the
//! audio artwork pipeline and a metadata space derived from catalog fields.
//! A single ranking signal is produced by blending the cosine similarity
//! in both spaces.

/// Weight of the content-space similarity in the blended score
pub const CONTENT_WEIGHT: f32 = 0.6;

/// Weight of the metadata-space similarity in the blended score
pub const METADATA_WEIGHT: f32 = 0.4;

/// Cosine similarity between two vectors: `dot(u, v) / (||u|| * ||v||)`.
///
/// Returns `None` when either vector has a zero norm, where the quotient
/// is undefined. Callers decide how an undefined similarity ranks; the
/// engine maps it to a sentinel that is never preferred.
pub fn cosine_similarity(u: &[f32], v: &[f32]) -> Option<f32> {
    debug_assert_eq!(u.len(), v.len(), "vectors must share a dimension");

    let mut dot = 0.0f32;
    let mut norm_u = 0.0f32;
    let mut norm_v = 0.0f32;
    for (a, b) in u.iter().zip(v.iter()) {
        dot += a * b;
        norm_u += a * a;
        norm_v += b * b;
    }

    if norm_u == 0.0 || norm_v == 0.0 {
        return None;
    }

    Some(dot / (norm_u.sqrt() * norm_v.sqrt()))
}

/// Blend the two per-space similarities into the single ranking signal.
///
/// An undefined similarity in either space poisons the whole blend: the
/// result is `f32::NEG_INFINITY`, which keeps the candidate pool totally
/// ordered while guaranteeing the candidate is never preferred over one
/// with a defined score.
pub fn blended_score(content: Option<f32>, metadata: Option<f32>) -> f32 {
    match (content, metadata) {
        (Some(c), Some(m)) => CONTENT_WEIGHT * c + METADATA_WEIGHT * m,
        _ => f32::NEG_INFINITY,
    }
}
