/// Preference edits routed through the store's read-modify-write
///
/// Each operation is a pure transform from `UserPreferences` handed to
/// `Store::update_preferences`, so concurrent edits for one user never lose
/// each other's changes.
use uuid::Uuid;

use crate::{
    db::Store,
    error::AppResult,
    models::{Genre, MoodPreference, MovieId, UserPreferences},
};

pub async fn get(store: &dyn Store, user_id: Uuid) -> AppResult<UserPreferences> {
    store.load_preferences(user_id).await
}

/// Likes or dislikes a movie; the two lists stay disjoint
pub async fn rate_movie(
    store: &dyn Store,
    user_id: Uuid,
    movie_id: MovieId,
    liked: bool,
) -> AppResult<UserPreferences> {
    let prefs = store
        .update_preferences(
            user_id,
            Box::new(move |prefs: UserPreferences| Ok(prefs.rate(movie_id, liked))),
        )
        .await?;

    tracing::info!(user_id = %user_id, movie_id = %movie_id, liked, "Movie rated");

    Ok(prefs)
}

pub async fn toggle_watchlist(
    store: &dyn Store,
    user_id: Uuid,
    movie_id: MovieId,
    add: bool,
) -> AppResult<UserPreferences> {
    store
        .update_preferences(
            user_id,
            Box::new(move |prefs: UserPreferences| Ok(prefs.toggle_watchlist(movie_id, add))),
        )
        .await
}

/// Out-of-range values are rejected and the stored threshold is kept
pub async fn set_rating_threshold(
    store: &dyn Store,
    user_id: Uuid,
    value: f64,
) -> AppResult<UserPreferences> {
    store
        .update_preferences(
            user_id,
            Box::new(move |prefs: UserPreferences| prefs.set_rating_threshold(value)),
        )
        .await
}

pub async fn set_favorite_genres(
    store: &dyn Store,
    user_id: Uuid,
    genres: Vec<Genre>,
) -> AppResult<UserPreferences> {
    store
        .update_preferences(
            user_id,
            Box::new(move |prefs: UserPreferences| Ok(prefs.set_favorite_genres(genres))),
        )
        .await
}

/// Mood history, heaviest first
pub async fn mood_preferences(store: &dyn Store, user_id: Uuid) -> AppResult<Vec<MoodPreference>> {
    Ok(store.load_preferences(user_id).await?.moods_by_weight())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::AppError;
    use crate::models::{Mood, User};
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    async fn setup() -> (Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let user = User {
            id: Uuid::new_v4(),
            email: "viewer@example.com".to_string(),
            username: "viewer".to_string(),
            first_name: None,
            last_name: None,
            avatar: None,
            created_at: Utc::now(),
        };
        let user_id = user.id;
        store.create_user(user).await.unwrap();
        (store, user_id)
    }

    #[tokio::test]
    async fn test_like_then_dislike_moves_between_lists() {
        let (store, user_id) = setup().await;

        let prefs = rate_movie(store.as_ref(), user_id, MovieId(42), true).await.unwrap();
        assert!(prefs.liked_movies.contains(&MovieId(42)));

        let prefs = rate_movie(store.as_ref(), user_id, MovieId(42), false).await.unwrap();
        assert!(!prefs.liked_movies.contains(&MovieId(42)));
        assert!(prefs.disliked_movies.contains(&MovieId(42)));
        assert_eq!(get(store.as_ref(), user_id).await.unwrap(), prefs);
    }

    #[tokio::test]
    async fn test_watchlist_toggle_is_idempotent() {
        let (store, user_id) = setup().await;

        toggle_watchlist(store.as_ref(), user_id, MovieId(7), true).await.unwrap();
        let prefs = toggle_watchlist(store.as_ref(), user_id, MovieId(7), true).await.unwrap();
        assert_eq!(prefs.watchlist.len(), 1);

        toggle_watchlist(store.as_ref(), user_id, MovieId(7), false).await.unwrap();
        let prefs = toggle_watchlist(store.as_ref(), user_id, MovieId(7), false).await.unwrap();
        assert!(prefs.watchlist.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_threshold_leaves_preferences_unchanged() {
        let (store, user_id) = setup().await;
        set_rating_threshold(store.as_ref(), user_id, 7.5).await.unwrap();

        let result = set_rating_threshold(store.as_ref(), user_id, 11.0).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(get(store.as_ref(), user_id).await.unwrap().rating_threshold, 7.5);
    }

    #[tokio::test]
    async fn test_set_favorite_genres_replaces_set() {
        let (store, user_id) = setup().await;
        set_favorite_genres(store.as_ref(), user_id, vec![Genre::Drama]).await.unwrap();
        let prefs = set_favorite_genres(store.as_ref(), user_id, vec![Genre::Horror, Genre::Horror])
            .await
            .unwrap();
        assert_eq!(prefs.favorite_genres.into_iter().collect::<Vec<_>>(), vec![Genre::Horror]);
    }

    #[tokio::test]
    async fn test_concurrent_edits_are_not_lost() {
        let (store, user_id) = setup().await;

        let mut tasks = Vec::new();
        for id in 0..20 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                toggle_watchlist(store.as_ref(), user_id, MovieId(id), true).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(get(store.as_ref(), user_id).await.unwrap().watchlist.len(), 20);
    }

    #[tokio::test]
    async fn test_mood_preferences_heaviest_first() {
        let (store, user_id) = setup().await;
        let now = Utc::now();
        store
            .update_preferences(
                user_id,
                Box::new(move |prefs: UserPreferences| {
                    Ok(prefs
                        .select_mood(Mood::Cozy, now)
                        .select_mood(Mood::Epic, now + Duration::seconds(1))
                        .select_mood(Mood::Epic, now + Duration::seconds(2)))
                }),
            )
            .await
            .unwrap();

        let moods: Vec<Mood> = mood_preferences(store.as_ref(), user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.mood)
            .collect();
        assert_eq!(moods, vec![Mood::Epic, Mood::Cozy]);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let store = MemoryStore::new();
        assert!(matches!(
            rate_movie(&store, Uuid::new_v4(), MovieId(1), true).await,
            Err(AppError::NotFound(_))
        ));
    }
}
