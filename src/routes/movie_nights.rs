use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::AppState;
use crate::{
    error::AppResult,
    middleware::CurrentUser,
    models::{MovieId, MovieNightDraft, MovieNightPatch, MovieNightWindow},
    services::movie_nights,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    status: MovieNightWindow,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMoviesRequest {
    movie_ids: Vec<i64>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Json(draft): Json<MovieNightDraft>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let night = movie_nights::create(state.store.as_ref(), user_id, draft, Utc::now()).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Movie night created",
            "movieNight": night,
        })),
    ))
}

/// `?status=upcoming|past`; everything when absent
pub async fn list(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Value>> {
    let nights =
        movie_nights::list(state.store.as_ref(), user_id, params.status, Utc::now()).await?;
    Ok(Json(json!({ "movieNights": nights })))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<MovieNightPatch>,
) -> AppResult<Json<Value>> {
    let night = movie_nights::update(state.store.as_ref(), user_id, id, patch, Utc::now()).await?;
    Ok(Json(json!({
        "message": "Movie night updated",
        "movieNight": night,
    })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    movie_nights::delete(state.store.as_ref(), user_id, id).await?;
    Ok(Json(json!({ "message": "Movie night deleted" })))
}

pub async fn add_movies(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AddMoviesRequest>,
) -> AppResult<Json<Value>> {
    let movie_ids: Vec<MovieId> = request.movie_ids.into_iter().map(MovieId).collect();
    let night = movie_nights::add_movies(state.store.as_ref(), user_id, id, &movie_ids).await?;
    Ok(Json(json!({
        "message": "Movies added to movie night",
        "movieNight": night,
    })))
}
