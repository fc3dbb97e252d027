use ::redis::{AsyncCommands, Client};
use tokio::{sync::mpsc, task::JoinHandle};

use super::ResponseCache;
use crate::error::AppResult;

/// Creates a Redis client for caching
///
/// Connections are opened lazily as multiplexed async connections.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Redis-backed response cache. Writes go through a background task.
#[derive(Clone)]
pub struct RedisCache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl CacheWriterHandle {
    /// Signals the writer task and waits until every pending write is flushed
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
        let _ = self.task.await;
    }
}

impl RedisCache {
    /// Creates the cache and spawns its background writer
    pub fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        let task = tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            write_tx,
        };

        (cache, CacheWriterHandle { shutdown_tx, task })
    }

    /// Writes queued messages until shutdown, then flushes whatever is left
    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::error!(error = %e, "Failed to write to Redis cache");
                    }
                }
                _ = shutdown_rx.recv() => {
                    // Stop accepting writes so the flush below terminates
                    write_rx.close();
                    let mut flushed = 0usize;
                    while let Some(msg) = write_rx.recv().await {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::error!(error = %e, "Failed to flush cache write during shutdown");
                        } else {
                            flushed += 1;
                        }
                    }

                    tracing::info!(flushed, "Cache writer task stopped");
                    break;
                }
                else => break,
            }
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ResponseCache for RedisCache {
    async fn get_raw(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key).await?;
        Ok(cached)
    }

    fn set_raw(&self, key: String, value: String, ttl: u64) {
        let msg = CacheWriteMessage { key, value, ttl };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

// These talk to a live server at REDIS_URL and are skipped by default.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::cache::CacheKey;
    use crate::models::{CatalogCategory, CatalogQuery};
    use std::sync::Arc;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    fn key(search: &str) -> CacheKey {
        CacheKey::Catalog(CatalogQuery {
            category: Some(CatalogCategory::Popular),
            search: Some(search.to_string()),
            genre: None,
            page: 1,
        })
    }

    #[test]
    fn test_create_redis_client_rejects_bad_url() {
        assert!(create_redis_client("not a url").is_err());
    }

    #[tokio::test]
    #[ignore]
    async fn test_cache_miss() {
        let client = create_redis_client(&redis_url()).unwrap();
        let (cache, _handle) = RedisCache::new(client);
        let cache: Arc<dyn ResponseCache> = Arc::new(cache);

        let retrieved: Option<Vec<String>> = cache
            .get_from_cache(&key("nonexistent_key_12345"))
            .await
            .unwrap();

        assert_eq!(retrieved, None);
    }

    #[tokio::test]
    #[ignore]
    async fn test_shutdown_flushes_pending_writes() {
        let client = create_redis_client(&redis_url()).unwrap();
        let (cache, handle) = RedisCache::new(client.clone());
        let cache: Arc<dyn ResponseCache> = Arc::new(cache);

        let key = key("test_shutdown");
        let value = vec!["shutdown_test".to_string()];
        cache.set_in_background(&key, &value, 60);

        handle.shutdown().await;

        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, Some(value));

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.del(key.to_string()).await.unwrap();
    }
}
