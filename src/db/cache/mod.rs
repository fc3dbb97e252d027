/// Response cache abstraction
///
/// Values are stored as JSON strings under a `CacheKey`. Writes are
/// fire-and-forget so a slow cache never holds up a response; reads report
/// a miss as `None`.
use std::fmt::Display;

use crate::{
    error::{AppError, AppResult},
    models::CatalogQuery,
};

mod macros;
pub mod memory;
pub mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::{create_redis_client, CacheWriterHandle, RedisCache};

#[derive(Debug, Clone, PartialEq)]
pub enum CacheKey {
    Catalog(CatalogQuery),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Catalog(query) => write!(
                f,
                "catalog:{}_{}_{}_page{}",
                query.category.map(|c| c.as_str()).unwrap_or("all"),
                query
                    .search
                    .as_deref()
                    .map(|s| s.to_lowercase())
                    .unwrap_or_else(|| "none".to_string()),
                query.genre.map(|g| g.as_str()).unwrap_or("all"),
                query.page
            ),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ResponseCache: Send + Sync {
    /// Raw JSON stored under `key`, if present and not expired
    async fn get_raw(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores `value` under `key` for `ttl` seconds without waiting for the write
    fn set_raw(&self, key: String, value: String, ttl: u64);

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

impl dyn ResponseCache {
    /// Retrieves and deserializes the value cached under `key`
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        match self.get_raw(&key.to_string()).await? {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Serializes `value` and hands it to the backend without waiting
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        self.set_raw(key.to_string(), json, ttl);
    }
}

/// Cache that stores nothing
pub struct NoopCache;

#[async_trait::async_trait]
impl ResponseCache for NoopCache {
    async fn get_raw(&self, _key: &str) -> AppResult<Option<String>> {
        Ok(None)
    }

    fn set_raw(&self, _key: String, _value: String, _ttl: u64) {}

    fn name(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogCategory, Genre};
    use std::sync::Arc;

    fn query(category: Option<CatalogCategory>, search: Option<&str>, genre: Option<Genre>) -> CatalogQuery {
        CatalogQuery {
            category,
            search: search.map(str::to_string),
            genre,
            page: 2,
        }
    }

    #[test]
    fn test_cache_key_display_defaults() {
        let key = CacheKey::Catalog(query(None, None, None));
        assert_eq!(format!("{}", key), "catalog:all_none_all_page2");
    }

    #[test]
    fn test_cache_key_display_full() {
        let key = CacheKey::Catalog(query(
            Some(CatalogCategory::TopRated),
            Some("The Matrix"),
            Some(Genre::SciFi),
        ));
        assert_eq!(format!("{}", key), "catalog:top_rated_the matrix_sci-fi_page2");
    }

    #[tokio::test]
    async fn test_noop_cache_always_misses() {
        let cache: Arc<dyn ResponseCache> = Arc::new(NoopCache);
        let key = CacheKey::Catalog(query(None, None, None));

        cache.set_in_background(&key, &vec![1, 2, 3], 60);
        let cached: Option<Vec<i32>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(cached, None);
    }

    #[tokio::test]
    async fn test_get_from_cache_rejects_malformed_json() {
        let mut mock = MockResponseCache::new();
        mock.expect_get_raw()
            .returning(|_| Ok(Some("not json".to_string())));
        let cache: Arc<dyn ResponseCache> = Arc::new(mock);

        let result: AppResult<Option<Vec<i32>>> = cache
            .get_from_cache(&CacheKey::Catalog(query(None, None, None)))
            .await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_set_in_background_serializes_with_key() {
        let mut mock = MockResponseCache::new();
        mock.expect_set_raw()
            .withf(|key, value, ttl| {
                key == "catalog:popular_none_all_page2" && value == "[1,2]" && *ttl == 300
            })
            .times(1)
            .return_const(());
        let cache: Arc<dyn ResponseCache> = Arc::new(mock);

        cache.set_in_background(
            &CacheKey::Catalog(query(Some(CatalogCategory::Popular), None, None)),
            &vec![1, 2],
            300,
        );
    }
}
