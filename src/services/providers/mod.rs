/// Upstream movie catalog abstraction
///
/// Live browse and search go through a `CatalogProvider`. Implementations are
/// expected to route every outbound call through the request governor and to
/// surface rate limits as `AppError::UpstreamRateLimited`.
use crate::{
    error::AppResult,
    models::{CatalogPage, CatalogQuery},
};

pub mod tmdb;

pub use tmdb::TmdbProvider;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Fetches one page of the list, search or discover endpoint `query` resolves to
    async fn fetch_catalog(&self, query: &CatalogQuery) -> AppResult<CatalogPage>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
