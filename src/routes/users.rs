use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use super::AppState;
use crate::{
    error::AppResult,
    middleware::CurrentUser,
    models::NewUser,
    services::{preferences, users},
};

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(new_user): Json<NewUser>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user = users::register(state.store.as_ref(), new_user, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

/// The caller's profile with their preferences
pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> AppResult<Json<Value>> {
    let user = users::current(state.store.as_ref(), user_id).await?;
    let prefs = preferences::get(state.store.as_ref(), user_id).await?;
    Ok(Json(json!({ "user": user, "preferences": prefs })))
}
