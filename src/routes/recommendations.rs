use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::AppState;
use crate::{
    error::AppResult,
    middleware::CurrentUser,
    models::{Mood, MovieId},
    services::{preferences, recommendations},
};

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub liked: bool,
}

#[derive(Debug, Deserialize)]
pub struct WatchlistRequest {
    pub add: bool,
}

/// Records the mood pick and returns movies for it. The mood is validated
/// before anything is written.
pub async fn by_mood(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(mood): Path<String>,
) -> AppResult<Json<Value>> {
    let mood: Mood = mood.parse()?;
    let picks = recommendations::for_mood(state.store.as_ref(), user_id, mood, Utc::now()).await?;
    let user_weight = picks.preferences.mood_weight(mood);

    Ok(Json(json!({
        "mood": mood,
        "movies": picks.movies,
        "userWeight": user_weight,
        "preferences": picks.preferences,
    })))
}

pub async fn personalized(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> AppResult<Json<Value>> {
    let movies = recommendations::personalized(state.store.as_ref(), user_id).await?;
    Ok(Json(json!({ "movies": movies })))
}

pub async fn rate_movie(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(movie_id): Path<i64>,
    Json(request): Json<RateRequest>,
) -> AppResult<Json<Value>> {
    let prefs =
        preferences::rate_movie(state.store.as_ref(), user_id, MovieId(movie_id), request.liked)
            .await?;

    Ok(Json(json!({
        "message": if request.liked { "Movie liked" } else { "Movie disliked" },
        "likedMovies": prefs.liked_movies,
        "dislikedMovies": prefs.disliked_movies,
    })))
}

pub async fn watchlist(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(movie_id): Path<i64>,
    Json(request): Json<WatchlistRequest>,
) -> AppResult<Json<Value>> {
    let prefs =
        preferences::toggle_watchlist(state.store.as_ref(), user_id, MovieId(movie_id), request.add)
            .await?;

    let message = if request.add {
        "Movie added to watchlist"
    } else {
        "Movie removed from watchlist"
    };

    Ok(Json(json!({
        "message": message,
        "watchlist": prefs.watchlist,
    })))
}

pub async fn mood_preferences(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> AppResult<Json<Value>> {
    let moods = preferences::mood_preferences(state.store.as_ref(), user_id).await?;
    Ok(Json(json!({ "moodPreferences": moods })))
}
