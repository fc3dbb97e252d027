use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use super::AppState;
use crate::{
    error::AppResult,
    middleware::CurrentUser,
    models::{Genre, UserPreferences},
    services::preferences,
};

#[derive(Debug, Deserialize)]
pub struct RatingThresholdRequest {
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteGenresRequest {
    pub genres: Vec<String>,
}

pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> AppResult<Json<UserPreferences>> {
    let prefs = preferences::get(state.store.as_ref(), user_id).await?;
    Ok(Json(prefs))
}

pub async fn set_rating_threshold(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<RatingThresholdRequest>,
) -> AppResult<Json<UserPreferences>> {
    let prefs =
        preferences::set_rating_threshold(state.store.as_ref(), user_id, request.value).await?;
    Ok(Json(prefs))
}

pub async fn set_favorite_genres(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<FavoriteGenresRequest>,
) -> AppResult<Json<UserPreferences>> {
    let genres = request
        .genres
        .iter()
        .map(|g| g.parse::<Genre>())
        .collect::<AppResult<Vec<_>>>()?;

    let prefs = preferences::set_favorite_genres(state.store.as_ref(), user_id, genres).await?;
    Ok(Json(prefs))
}
