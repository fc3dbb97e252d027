/// TMDB catalog provider
///
/// Every request is cached by query shape and dispatched through the
/// request governor, so concurrent browsers share one throttled lane to TMDB.
use reqwest::{Client as HttpClient, StatusCode};
use std::sync::Arc;

use crate::{
    cached,
    config::Config,
    db::{CacheKey, ResponseCache},
    error::{AppError, AppResult},
    models::{CatalogPage, CatalogQuery, TmdbPage},
    services::{governor::RequestGovernor, providers::CatalogProvider},
};

pub struct TmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    image_url: String,
    cache: Arc<dyn ResponseCache>,
    cache_ttl: u64,
    governor: RequestGovernor,
}

impl TmdbProvider {
    pub fn new(
        config: &Config,
        cache: Arc<dyn ResponseCache>,
        governor: RequestGovernor,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(config.tmdb_timeout())
            .build()?;

        Ok(Self {
            http_client,
            api_key: config.tmdb_api_key.clone(),
            api_url: config.tmdb_api_url.trim_end_matches('/').to_string(),
            image_url: config.tmdb_image_url.trim_end_matches('/').to_string(),
            cache,
            cache_ttl: config.catalog_cache_ttl_secs,
            governor,
        })
    }

    /// Maps a non-success TMDB status to the error the rest of the app understands
    pub fn classify_status(status: StatusCode, body: &str) -> AppError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                AppError::UpstreamRateLimited("TMDB rate limit exceeded".to_string())
            }
            StatusCode::UNAUTHORIZED => AppError::ExternalApi("invalid TMDB API key".to_string()),
            s if s.is_server_error() => {
                AppError::UpstreamUnavailable(format!("TMDB returned status {}", s))
            }
            s => AppError::ExternalApi(format!("TMDB returned status {}: {}", s, body)),
        }
    }

    /// One raw GET against TMDB. Runs inside the governor.
    async fn request_page(
        http_client: &HttpClient,
        url: &str,
        params: &[(&'static str, String)],
    ) -> AppResult<TmdbPage> {
        let response = http_client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(AppError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        response
            .json::<TmdbPage>()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Failed to parse TMDB response: {}", e)))
    }
}

#[async_trait::async_trait]
impl CatalogProvider for TmdbProvider {
    async fn fetch_catalog(&self, query: &CatalogQuery) -> AppResult<CatalogPage> {
        cached!(
            self.cache,
            CacheKey::Catalog(query.clone()),
            self.cache_ttl,
            async move {
                let (path, mut params) = query.endpoint();
                params.extend([
                    ("api_key", self.api_key.clone()),
                    ("page", query.page.to_string()),
                    ("language", "en-US".to_string()),
                    ("include_adult", "false".to_string()),
                ]);
                let url = format!("{}{}", self.api_url, path);

                let http_client = self.http_client.clone();
                let page = self
                    .governor
                    .enqueue_default(move || {
                        let http_client = http_client.clone();
                        let url = url.clone();
                        let params = params.clone();
                        async move { Self::request_page(&http_client, &url, &params).await }
                    })
                    .await
                    .map_err(|e| {
                        tracing::warn!(
                            error = %e,
                            endpoint = %path,
                            page = query.page,
                            provider = "tmdb",
                            "Catalog fetch failed"
                        );
                        e
                    })?;

                let catalog = page.into_catalog_page(&self.image_url);

                tracing::info!(
                    endpoint = %path,
                    page = catalog.page,
                    results = catalog.movies.len(),
                    provider = "tmdb",
                    "Catalog page fetched"
                );

                Ok::<_, AppError>(catalog)
            }
        )
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}
