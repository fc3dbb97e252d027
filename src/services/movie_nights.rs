use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::Store,
    error::{AppError, AppResult},
    models::{MovieId, MovieNight, MovieNightDraft, MovieNightPatch, MovieNightWindow, MovieSummary},
};

pub async fn create(
    store: &dyn Store,
    host_id: Uuid,
    draft: MovieNightDraft,
    now: DateTime<Utc>,
) -> AppResult<MovieNight> {
    let night = draft.into_movie_night(host_id, now)?;
    let night = store.insert_movie_night(night).await?;

    tracing::info!(
        movie_night_id = %night.id,
        host_id = %host_id,
        date = %night.date,
        guests = night.guests.len(),
        "Movie night created"
    );

    Ok(night)
}

pub async fn list(
    store: &dyn Store,
    host_id: Uuid,
    window: MovieNightWindow,
    now: DateTime<Utc>,
) -> AppResult<Vec<MovieNight>> {
    store
        .list_movie_nights(host_id, window, now.date_naive())
        .await
}

pub async fn update(
    store: &dyn Store,
    host_id: Uuid,
    night_id: Uuid,
    patch: MovieNightPatch,
    now: DateTime<Utc>,
) -> AppResult<MovieNight> {
    let night = store
        .find_movie_night(host_id, night_id)
        .await?
        .apply(patch, now)?;
    store.update_movie_night(&night).await?;
    Ok(night)
}

pub async fn delete(store: &dyn Store, host_id: Uuid, night_id: Uuid) -> AppResult<()> {
    store.delete_movie_night(host_id, night_id).await?;
    tracing::info!(movie_night_id = %night_id, host_id = %host_id, "Movie night deleted");
    Ok(())
}

/// Attaches local catalog movies to the event and returns it refreshed.
///
/// Every id must resolve before anything is attached. Movies already on the
/// event, or repeated in `movie_ids`, are attached once.
pub async fn add_movies(
    store: &dyn Store,
    host_id: Uuid,
    night_id: Uuid,
    movie_ids: &[MovieId],
) -> AppResult<MovieNight> {
    if movie_ids.is_empty() {
        return Err(AppError::InvalidInput(
            "movieIds must contain at least one movie".to_string(),
        ));
    }

    let night = store.find_movie_night(host_id, night_id).await?;

    let mut summaries: Vec<MovieSummary> = Vec::with_capacity(movie_ids.len());
    for &movie_id in movie_ids {
        let movie = store
            .find_movie(movie_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Movie {} not found", movie_id)))?;

        if !night.has_movie(movie_id) && !summaries.iter().any(|s| s.id == movie_id) {
            summaries.push(MovieSummary::from(&movie));
        }
    }

    if !summaries.is_empty() {
        store.attach_movies(night_id, &summaries).await?;
    }

    store.find_movie_night(host_id, night_id).await
}
