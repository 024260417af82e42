use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Content-space vectors, positional
const CONTENT_EMBEDDINGS_FILE: &str = "content_embeddings.json";
/// Track ids parallel to the content vectors
const LABELS_FILE: &str = "labels.json";
/// Metadata-space vectors keyed by track id
const METADATA_EMBEDDINGS_FILE: &str = "metadata_embeddings.json";

/// Errors raised while loading the embedding artifacts.
///
/// All of these are fatal: a store that fails validation must prevent the
/// service from starting, there is no degraded mode.
#[derive(Debug, thiserror::Error)]
pub enum StoreLoadError {
    #[error("Failed to read embedding artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed embedding artifact {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Embedding artifacts are length-mismatched: {vectors} content vectors vs {labels} labels")]
    LengthMismatch { vectors: usize, labels: usize },

    #[error("Inconsistent dimensions in the {space} space: expected {expected}, found {found}")]
    RaggedVectors {
        space: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Label {0} has no metadata vector")]
    MissingMetadataVector(Uuid),
}

/// Process-wide collection of per-track feature vectors.
///
/// Holds two independent embedding spaces: positional content vectors with
/// a parallel label sequence, and metadata vectors keyed by track id.
/// Loaded once at startup and shared read-only behind an `Arc`; no lock is
/// needed on the scoring path.
///
/// The label sequence is not assumed unique: repeated labels are tolerated,
/// with id lookups resolving to the first occurrence.
#[derive(Debug)]
pub struct EmbeddingStore {
    content_vectors: Vec<Vec<f32>>,
    labels: Vec<Uuid>,
    metadata_vectors: HashMap<Uuid, Vec<f32>>,
    positions: HashMap<Uuid, usize>,
}

impl EmbeddingStore {
    /// Builds a store from already-deserialized artifacts, validating every
    /// invariant the scoring path relies on.
    pub fn new(
        content_vectors: Vec<Vec<f32>>,
        labels: Vec<Uuid>,
        metadata_vectors: HashMap<Uuid, Vec<f32>>,
    ) -> Result<Self, StoreLoadError> {
        if content_vectors.len() != labels.len() {
            return Err(StoreLoadError::LengthMismatch {
                vectors: content_vectors.len(),
                labels: labels.len(),
            });
        }

        if let Some(first) = content_vectors.first() {
            let expected = first.len();
            for vector in &content_vectors {
                if vector.len() != expected {
                    return Err(StoreLoadError::RaggedVectors {
                        space: "content",
                        expected,
                        found: vector.len(),
                    });
                }
            }
        }

        if let Some(first) = metadata_vectors.values().next() {
            let expected = first.len();
            for vector in metadata_vectors.values() {
                if vector.len() != expected {
                    return Err(StoreLoadError::RaggedVectors {
                        space: "metadata",
                        expected,
                        found: vector.len(),
                    });
                }
            }
        }

        // Every label must resolve in the metadata space.
        for label in &labels {
            if !metadata_vectors.contains_key(label) {
                return Err(StoreLoadError::MissingMetadataVector(*label));
            }
        }

        // First occurrence wins for repeated labels.
        let mut positions = HashMap::with_capacity(labels.len());
        for (position, label) in labels.iter().enumerate() {
            positions.entry(*label).or_insert(position);
        }

        Ok(Self {
            content_vectors,
            labels,
            metadata_vectors,
            positions,
        })
    }

    /// Loads the store from the three JSON artifacts in `dir`.
    pub fn load(dir: &Path) -> Result<Self, StoreLoadError> {
        let content_vectors: Vec<Vec<f32>> = read_artifact(dir.join(CONTENT_EMBEDDINGS_FILE))?;
        let labels: Vec<Uuid> = read_artifact(dir.join(LABELS_FILE))?;
        let metadata_vectors: HashMap<Uuid, Vec<f32>> =
            read_artifact(dir.join(METADATA_EMBEDDINGS_FILE))?;

        Self::new(content_vectors, labels, metadata_vectors)
    }

    /// Number of catalog entries at load time
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, track_id: &Uuid) -> bool {
        self.positions.contains_key(track_id)
    }

    /// Position of the first occurrence of `track_id` in the label sequence
    pub fn position_of(&self, track_id: &Uuid) -> Option<usize> {
        self.positions.get(track_id).copied()
    }

    pub fn label(&self, position: usize) -> Option<Uuid> {
        self.labels.get(position).copied()
    }

    pub fn content_vector(&self, position: usize) -> Option<&[f32]> {
        self.content_vectors.get(position).map(Vec::as_slice)
    }

    pub fn metadata_vector(&self, track_id: &Uuid) -> Option<&[f32]> {
        self.metadata_vectors.get(track_id).map(Vec::as_slice)
    }

    /// Both vectors for a track, or `None` if the id is absent from the store
    pub fn vectors_for(&self, track_id: &Uuid) -> Option<(&[f32], &[f32])> {
        let position = self.position_of(track_id)?;
        let content = self.content_vector(position)?;
        let metadata = self.metadata_vector(track_id)?;
        Some((content, metadata))
    }

    /// Iterates over `(position, label, content_vector)` in positional order
    pub fn entries(&self) -> impl Iterator<Item = (usize, Uuid, &[f32])> {
        self.labels
            .iter()
            .zip(self.content_vectors.iter())
            .enumerate()
            .map(|(position, (label, vector))| (position, *label, vector.as_slice()))
    }
}

fn read_artifact<T: DeserializeOwned>(path: PathBuf) -> Result<T, StoreLoadError> {
    let bytes = fs::read(&path).map_err(|source| StoreLoadError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| StoreLoadError::Malformed { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn valid_artifacts() -> (Vec<Vec<f32>>, Vec<Uuid>, HashMap<Uuid, Vec<f32>>) {
        let content = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let labels = vec![track(1), track(2)];
        let metadata = HashMap::from([
            (track(1), vec![0.5, 0.5, 0.0]),
            (track(2), vec![0.0, 0.5, 0.5]),
        ]);
        (content, labels, metadata)
    }

    #[test]
    fn test_new_accepts_valid_artifacts() {
        let (content, labels, metadata) = valid_artifacts();
        let store = EmbeddingStore::new(content, labels, metadata).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains(&track(1)));
        assert_eq!(store.position_of(&track(2)), Some(1));
        assert_eq!(store.label(0), Some(track(1)));
        assert_eq!(store.content_vector(1), Some([0.0, 1.0].as_slice()));
        assert_eq!(store.label(7), None);
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        let (content, mut labels, metadata) = valid_artifacts();
        labels.pop();
        let err = EmbeddingStore::new(content, labels, metadata).unwrap_err();
        assert!(matches!(
            err,
            StoreLoadError::LengthMismatch {
                vectors: 2,
                labels: 1
            }
        ));
    }

    #[test]
    fn test_new_rejects_missing_metadata_vector() {
        let (content, labels, mut metadata) = valid_artifacts();
        metadata.remove(&track(2));
        let err = EmbeddingStore::new(content, labels, metadata).unwrap_err();
        assert!(matches!(err, StoreLoadError::MissingMetadataVector(id) if id == track(2)));
    }

    #[test]
    fn test_new_rejects_ragged_content_vectors() {
        let (mut content, labels, metadata) = valid_artifacts();
        content[1] = vec![0.0, 1.0, 2.0];
        let err = EmbeddingStore::new(content, labels, metadata).unwrap_err();
        assert!(matches!(
            err,
            StoreLoadError::RaggedVectors {
                space: "content",
                ..
            }
        ));
    }

    #[test]
    fn test_repeated_labels_resolve_to_first_position() {
        let content = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
        let labels = vec![track(1), track(2), track(1)];
        let metadata = HashMap::from([
            (track(1), vec![1.0]),
            (track(2), vec![1.0]),
        ]);
        let store = EmbeddingStore::new(content, labels, metadata).unwrap();
        assert_eq!(store.position_of(&track(1)), Some(0));
        let (content_vec, _) = store.vectors_for(&track(1)).unwrap();
        assert_eq!(content_vec, [1.0, 0.0].as_slice());
    }

    #[test]
    fn test_vectors_for_unknown_track() {
        let (content, labels, metadata) = valid_artifacts();
        let store = EmbeddingStore::new(content, labels, metadata).unwrap();
        assert_eq!(store.vectors_for(&track(9)), None);
    }

    #[test]
    fn test_load_round_trips_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let (content, labels, metadata) = valid_artifacts();
        fs::write(
            dir.path().join(CONTENT_EMBEDDINGS_FILE),
            serde_json::to_vec(&content).unwrap(),
        )
        .unwrap();
        fs::write(
            dir.path().join(LABELS_FILE),
            serde_json::to_vec(&labels).unwrap(),
        )
        .unwrap();
        fs::write(
            dir.path().join(METADATA_EMBEDDINGS_FILE),
            serde_json::to_vec(&metadata).unwrap(),
        )
        .unwrap();

        let store = EmbeddingStore::load(dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.metadata_vector(&track(1)), Some([0.5, 0.5, 0.0].as_slice()));
    }

    #[test]
    fn test_load_fails_on_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = EmbeddingStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, StoreLoadError::Io { .. }));
    }

    #[test]
    fn test_load_fails_on_malformed_artifact() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONTENT_EMBEDDINGS_FILE), b"not json").unwrap();
        let err = EmbeddingStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, StoreLoadError::Malformed { .. }));
    }
}
