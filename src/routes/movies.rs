use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::AppState;
use crate::{
    error::AppResult,
    models::{CatalogCategory, CatalogPage, Genre, Mood, MovieId},
    services::catalog::{self, BrowseList, PageRequest, SearchResults},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBrowseParams {
    category: Option<CatalogCategory>,
    search_query: Option<String>,
    genre: Option<String>,
    page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
    genre: Option<String>,
    mood: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    page: Option<i64>,
    limit: Option<i64>,
}

/// `"all"` and blank mean no constraint
fn parse_facet<T: std::str::FromStr<Err = crate::error::AppError>>(
    value: Option<String>,
) -> AppResult<Option<T>> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("all") => Ok(None),
        Some(v) => v.parse().map(Some),
    }
}

/// Live browse against the upstream catalog
pub async fn browse_live(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LiveBrowseParams>,
) -> AppResult<Json<CatalogPage>> {
    let query = catalog::live_query(
        params.category,
        params.search_query,
        params.genre.as_deref(),
        params.page,
    )?;
    let page = catalog::browse_live(state.catalog.as_ref(), &query).await?;
    Ok(Json(page))
}

/// Local catalog search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<SearchResults>> {
    let genre = parse_facet::<Genre>(params.genre)?;
    let mood = parse_facet::<Mood>(params.mood)?;
    let page = PageRequest::new(params.page, params.limit)?;

    let results = catalog::search(state.store.as_ref(), params.q, genre, mood, page).await?;
    Ok(Json(results))
}

async fn browse(state: &AppState, list: BrowseList, params: PageParams) -> AppResult<Json<Value>> {
    let page = PageRequest::new(params.page, params.limit)?;
    let movies = catalog::browse_local(state.store.as_ref(), list, page).await?;
    Ok(Json(json!({ "movies": movies })))
}

pub async fn browse_popular(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Value>> {
    browse(&state, BrowseList::Popular, params).await
}

pub async fn browse_top_rated(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Value>> {
    browse(&state, BrowseList::TopRated, params).await
}

pub async fn browse_genre(
    State(state): State<Arc<AppState>>,
    Path(genre): Path<String>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Value>> {
    let genre: Genre = genre.parse()?;
    browse(&state, BrowseList::Genre(genre), params).await
}

pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let movie = catalog::find_movie(state.store.as_ref(), MovieId(id)).await?;
    Ok(Json(json!({ "movie": movie })))
}
