use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use encore_api::config::Config;
use encore_api::db;
use encore_api::embeddings::EmbeddingStore;
use encore_api::routes::{create_router, AppState};
use encore_api::services::catalog::PostgresCatalog;
use encore_api::services::engine::RecommendationEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,encore_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Fail fast: an invalid store must keep the service from serving at all.
    let store = EmbeddingStore::load(&config.embeddings_dir).with_context(|| {
        format!(
            "loading embedding artifacts from {}",
            config.embeddings_dir.display()
        )
    })?;
    tracing::info!(tracks = store.len(), "Embedding store loaded");

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Connected to PostgreSQL");

    let redis_client = db::create_redis_client(&config.redis_url)?;
    let cache = db::Cache::new(redis_client);

    let state = AppState {
        engine: Arc::new(RecommendationEngine::new(Arc::new(store))),
        catalog: Arc::new(PostgresCatalog::new(pool)),
        cache,
        top_k: config.top_k,
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
