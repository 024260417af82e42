use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A track as resolved from the relational catalog.
///
/// Joins the artist, album and genre names in so consumers never see raw
/// foreign keys. `release_date` comes from the album.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrackRecord {
    pub id: Uuid,
    pub title: String,
    /// Artist name
    pub artist: String,
    /// Album name
    pub album: String,
    /// Genre name
    pub genre: String,
    pub cover_art: Option<String>,
    pub mp3_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub release_date: Option<NaiveDateTime>,
}

/// Response envelope for recommendation listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackListing {
    pub total_entries: usize,
    pub tracks: Vec<TrackRecord>,
}

impl From<Vec<TrackRecord>> for TrackListing {
    fn from(tracks: Vec<TrackRecord>) -> Self {
        Self {
            total_entries: tracks.len(),
            tracks,
        }
    }
}
