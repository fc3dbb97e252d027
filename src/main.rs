use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use moodreel_api::{
    config::{CacheBackend, Config, StoreBackend},
    db::{
        cache::{create_redis_client, CacheWriterHandle, MemoryCache, NoopCache, RedisCache},
        create_pool, run_migrations, MemoryStore, PgStore, ResponseCache, Store,
    },
    routes::{cors_layer, create_router, AppState},
    services::{GovernorConfig, RequestGovernor, TmdbProvider},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("moodreel_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = create_pool(&config.database_url).await?;
            run_migrations(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let mut cache_writer: Option<CacheWriterHandle> = None;
    let cache: Arc<dyn ResponseCache> = match config.cache_backend {
        CacheBackend::Redis => {
            let client = create_redis_client(&config.redis_url)?;
            let (cache, handle) = RedisCache::new(client);
            cache_writer = Some(handle);
            Arc::new(cache)
        }
        CacheBackend::Memory => Arc::new(MemoryCache::default()),
        CacheBackend::None => Arc::new(NoopCache),
    };
    tracing::info!(cache = cache.name(), "Response cache ready");

    let (governor, governor_handle) = RequestGovernor::new(GovernorConfig::from(&config));
    let catalog = Arc::new(TmdbProvider::new(&config, cache, governor)?);

    let state = Arc::new(AppState::new(store, catalog));
    let app = create_router(state).layer(cors_layer(&config.cors_allowed_origins));

    let address = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Draining outbound requests");
    governor_handle.shutdown().await;
    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
