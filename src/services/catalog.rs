/// Catalog browsing
///
/// Live browse goes to the upstream provider; search and the curated browse
/// lists read the local catalog through the store.
use serde::Serialize;

use crate::{
    db::Store,
    error::{AppError, AppResult},
    models::{
        CatalogCategory, CatalogFilter, CatalogPage, CatalogQuery, CatalogSort, Genre, Mood, Movie,
        MovieId,
    },
    services::providers::CatalogProvider,
};

/// Highest page TMDB will serve
pub const MAX_PAGE: u32 = 500;
pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Builds a validated live query. `genre` accepts a genre name or `"all"`.
pub fn live_query(
    category: Option<CatalogCategory>,
    search: Option<String>,
    genre: Option<&str>,
    page: Option<u32>,
) -> AppResult<CatalogQuery> {
    let page = page.unwrap_or(1);
    if !(1..=MAX_PAGE).contains(&page) {
        return Err(AppError::InvalidInput(format!(
            "page must be between 1 and {}",
            MAX_PAGE
        )));
    }

    let genre = match genre.map(str::trim) {
        None | Some("") => None,
        Some(g) if g.eq_ignore_ascii_case("all") => None,
        Some(g) => Some(g.parse::<Genre>()?),
    };

    let search = search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(CatalogQuery {
        category,
        search,
        genre,
        page,
    })
}

pub async fn browse_live(
    provider: &dyn CatalogProvider,
    query: &CatalogQuery,
) -> AppResult<CatalogPage> {
    provider.fetch_catalog(query).await
}

/// Page and page size for local listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> AppResult<Self> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);

        if page < 1 {
            return Err(AppError::InvalidInput("page must be at least 1".to_string()));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(AppError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    fn new(request: PageRequest, total: i64) -> Self {
        Self {
            page: request.page,
            limit: request.limit,
            total,
            pages: (total + request.limit - 1) / request.limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResults {
    pub movies: Vec<Movie>,
    pub pagination: Pagination,
}

/// Local catalog search. Every given clause must hold.
pub async fn search(
    store: &dyn Store,
    text: Option<String>,
    genre: Option<Genre>,
    mood: Option<Mood>,
    page: PageRequest,
) -> AppResult<SearchResults> {
    let filter = CatalogFilter {
        text: text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        genre,
        mood,
        ..Default::default()
    };

    let total = store.count_catalog_items(&filter).await?;
    let movies = store
        .find_catalog_items(
            &filter,
            CatalogSort::RatingThenPopularity,
            page.limit,
            page.offset(),
        )
        .await?;

    Ok(SearchResults {
        movies,
        pagination: Pagination::new(page, total),
    })
}

/// Curated lists over the local catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseList {
    Popular,
    TopRated,
    Genre(Genre),
}

impl BrowseList {
    fn filter(&self) -> CatalogFilter {
        match self {
            BrowseList::Genre(genre) => CatalogFilter {
                genre: Some(*genre),
                ..Default::default()
            },
            _ => CatalogFilter::default(),
        }
    }

    fn sort(&self) -> CatalogSort {
        match self {
            BrowseList::Popular => CatalogSort::PopularityThenRating,
            BrowseList::TopRated => CatalogSort::RatingThenVotes,
            BrowseList::Genre(_) => CatalogSort::RatingThenPopularity,
        }
    }
}

pub async fn browse_local(
    store: &dyn Store,
    list: BrowseList,
    page: PageRequest,
) -> AppResult<Vec<Movie>> {
    store
        .find_catalog_items(&list.filter(), list.sort(), page.limit, page.offset())
        .await
}

pub async fn find_movie(store: &dyn Store, movie_id: MovieId) -> AppResult<Movie> {
    store
        .find_movie(movie_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Movie {} not found", movie_id)))
}
