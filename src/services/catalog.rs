use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::TrackRecord;

/// Catalog collaborator abstraction
///
/// The recommendation core never touches the relational schema directly;
/// everything it needs from the catalog goes through this trait, which
/// keeps the orchestration logic testable against a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    /// Resolve track ids to full catalog records.
    ///
    /// Ids with no catalog row are silently absent from the result; the
    /// caller decides whether that is an error.
    async fn resolve_tracks(&self, ids: &[Uuid]) -> AppResult<Vec<TrackRecord>>;

    /// Ids of the tracks a user has liked, empty if none
    async fn liked_track_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;

    /// The user's preferred genre names, empty if none recorded
    async fn preferred_genres(&self, user_id: Uuid) -> AppResult<Vec<String>>;

    /// A plain genre-filtered listing, used by the preference fallback path
    async fn tracks_by_genres(&self, genres: &[String], limit: usize)
        -> AppResult<Vec<TrackRecord>>;
}

/// `Catalog` backed by the relational catalog in PostgreSQL
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TRACK_SELECT: &str = r#"
SELECT t.id,
       t.title,
       a.artist_name AS artist,
       al.name AS album,
       g.name AS genre,
       t.cover_art,
       t.mp3_url,
       t.tags,
       al.release_date
FROM track t
JOIN album al ON al.id = t.album_id
JOIN artist a ON a.id = t.artist_id
JOIN genre g ON g.id = t.genre_id
"#;

#[async_trait::async_trait]
impl Catalog for PostgresCatalog {
    async fn resolve_tracks(&self, ids: &[Uuid]) -> AppResult<Vec<TrackRecord>> {
        let query = format!("{} WHERE t.id = ANY($1)", TRACK_SELECT);
        let records = sqlx::query_as::<_, TrackRecord>(&query)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn liked_track_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT track_id FROM liked_track WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn preferred_genres(&self, user_id: Uuid) -> AppResult<Vec<String>> {
        let preferences = sqlx::query_scalar::<_, Option<Vec<String>>>(
            r#"SELECT preferences FROM "user" WHERE id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(preferences.flatten().unwrap_or_default())
    }

    async fn tracks_by_genres(
        &self,
        genres: &[String],
        limit: usize,
    ) -> AppResult<Vec<TrackRecord>> {
        let query = format!(
            "{} WHERE g.name = ANY($1) ORDER BY random() LIMIT $2",
            TRACK_SELECT
        );
        let records = sqlx::query_as::<_, TrackRecord>(&query)
            .bind(genres.to_vec())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }
}
