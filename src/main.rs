use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shelf_recs::{
    api::{create_router, AppState},
    cache::{create_redis_client, Cache, CacheWriterHandle},
    catalog::{create_pool, CatalogStore, PgCatalog, RestCatalog},
    config::{Config, ScoringMode},
    recommend::{RecommendationEngine, ScoringPool, ScoringStrategy, SharedSnapshotCache},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shelf_recs=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let catalog: Arc<dyn CatalogStore> = match &config.catalog_api_url {
        Some(api_url) => Arc::new(RestCatalog::new(
            api_url.clone(),
            config.catalog_api_token.clone(),
        )),
        None => {
            let pool = create_pool(&config.database_url)
                .await
                .context("Failed to connect to the catalog database")?;
            Arc::new(PgCatalog::new(pool))
        }
    };
    tracing::info!(backend = catalog.name(), "Catalog backend selected");

    let mut cache_writer: Option<CacheWriterHandle> = None;
    let shared_cache = match &config.redis_url {
        Some(redis_url) => {
            let client = create_redis_client(redis_url)?;
            let (cache, handle) = Cache::new(client);
            cache_writer = Some(handle);
            Some(SharedSnapshotCache {
                cache,
                ttl: config.snapshot_cache_ttl,
            })
        }
        None => None,
    };

    let strategy = match config.scoring_mode {
        ScoringMode::Sequential => ScoringStrategy::Sequential,
        ScoringMode::Parallel => {
            ScoringStrategy::Parallel(Arc::new(ScoringPool::new(config.scoring_workers)?))
        }
    };

    let engine = Arc::new(RecommendationEngine::new(catalog, shared_cache, strategy));
    let app = create_router(AppState::new(engine, config.default_top_n));

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!("Server running on http://{}", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
