use std::fmt::Display;

use redis::{AsyncCommands, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;

/// Keys for cached recommendation responses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    TrackRecommendations(Uuid),
    UserRecommendations { user_id: Uuid, limit: usize },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::TrackRecommendations(track_id) => write!(f, "rec:track:{}", track_id),
            CacheKey::UserRecommendations { user_id, limit } => {
                write!(f, "rec:user:{}:{}", user_id, limit)
            }
        }
    }
}

/// Creates a Redis client for caching
///
/// Establishes a connection to Redis for fast data caching.
/// Uses connection pooling via the connection-manager feature.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Cache handler for storing and retrieving recommendation responses.
///
/// All operations are best-effort: a failed read degrades to a miss and a
/// failed write is logged and dropped, so the cache can never fail a
/// request that the engine could have answered.
#[derive(Clone)]
pub struct Cache {
    client: Client,
}

impl Cache {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Retrieves a cached value, treating any Redis failure as a miss
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        match self.try_get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn try_get<T: DeserializeOwned>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        match cached {
            Some(json) => match serde_json::from_str(&json) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    // A schema change can leave stale entries behind; ignore them
                    // and let the fresh response overwrite the key.
                    tracing::warn!(key = %key, error = %e, "Undecodable cache entry ignored");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Stores a value without blocking the response.
    ///
    /// The write happens on a spawned task; the caller gets no confirmation
    /// and failures are only logged.
    pub fn put_in_background<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Cache serialization error");
                return;
            }
        };

        let client = self.client.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            let write = async {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let _: () = conn.set_ex(&key, json, ttl).await?;
                Ok::<_, redis::RedisError>(())
            };
            if let Err(e) = write.await {
                tracing::warn!(key = %key, error = %e, "Cache write failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display_track() {
        let id = Uuid::from_u128(7);
        let key = CacheKey::TrackRecommendations(id);
        assert_eq!(format!("{}", key), format!("rec:track:{}", id));
    }

    #[test]
    fn test_cache_key_display_user() {
        let id = Uuid::from_u128(9);
        let key = CacheKey::UserRecommendations {
            user_id: id,
            limit: 50,
        };
        assert_eq!(format!("{}", key), format!("rec:user:{}:50", id));
    }

    #[tokio::test]
    async fn test_get_degrades_to_miss_without_redis() {
        // Nothing listens on this port; the read must fail soft.
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let cache = Cache::new(client);

        let key = CacheKey::TrackRecommendations(Uuid::from_u128(1));
        let hit: Option<Vec<String>> = cache.get(&key).await;
        assert_eq!(hit, None);
    }
}
