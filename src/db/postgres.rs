use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};

// The catalog is read-only from this service and queries are short
// point-lookups, so a small pool goes a long way.
const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection pool over the relational catalog.
///
/// Fails fast at startup if PostgreSQL is unreachable rather than
/// lazily on the first request.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;

    Ok(pool)
}
