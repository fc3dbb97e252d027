use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::Store,
    error::AppResult,
    models::{CatalogFilter, CatalogSort, FacetMatch, Mood, Movie, UserPreferences},
};

/// Maximum number of movies in any recommendation list
pub const RECOMMENDATION_LIMIT: usize = 20;
/// How many of the heaviest moods count towards personalized picks
pub const PREFERRED_MOOD_COUNT: usize = 3;

/// Ordering shared by every recommendation list
pub const RECOMMENDATION_SORT: CatalogSort = CatalogSort::RatingThenPopularity;

/// Result of picking a mood: the updated preferences and the picks for it
#[derive(Debug, Clone, PartialEq)]
pub struct MoodRecommendation {
    pub preferences: UserPreferences,
    pub movies: Vec<Movie>,
}

/// Items tagged with `mood` or sharing a genre with it, at or above the
/// user's rating threshold
pub fn mood_filter(prefs: &UserPreferences, mood: Mood) -> CatalogFilter {
    CatalogFilter {
        min_rating: Some(prefs.rating_threshold),
        any_of: Some(FacetMatch {
            genres: mood.genres().to_vec(),
            moods: vec![mood],
        }),
        ..Default::default()
    }
}

/// Items the user has not disliked, at or above their rating threshold, that
/// share a favorite genre or one of their preferred moods.
///
/// With no favorite genres and no mood history the genre/mood clause is
/// dropped and every item clearing the threshold qualifies.
pub fn personalized_filter(prefs: &UserPreferences) -> CatalogFilter {
    let cold_start = prefs.favorite_genres.is_empty() && prefs.mood_preferences.is_empty();

    CatalogFilter {
        min_rating: Some(prefs.rating_threshold),
        any_of: (!cold_start).then(|| FacetMatch {
            genres: prefs.favorite_genres.iter().copied().collect(),
            moods: prefs.preferred_moods(PREFERRED_MOOD_COUNT),
        }),
        exclude: prefs.disliked_movies.iter().copied().collect(),
        ..Default::default()
    }
}

/// Stable sort by rating then popularity, cut to the recommendation limit
pub fn rank(candidates: impl IntoIterator<Item = Movie>) -> Vec<Movie> {
    let mut ranked: Vec<Movie> = candidates.into_iter().collect();
    ranked.sort_by(|a, b| RECOMMENDATION_SORT.compare(a, b));
    ranked.truncate(RECOMMENDATION_LIMIT);
    ranked
}

fn select(catalog: &[Movie], filter: &CatalogFilter) -> Vec<Movie> {
    rank(catalog.iter().filter(|movie| filter.matches(movie)).cloned())
}

/// Mood picks without touching the preferences
pub fn select_by_mood(catalog: &[Movie], prefs: &UserPreferences, mood: Mood) -> Vec<Movie> {
    select(catalog, &mood_filter(prefs, mood))
}

/// Records the mood selection, then picks for it
pub fn recommend_by_mood(
    catalog: &[Movie],
    prefs: UserPreferences,
    mood: Mood,
    at: DateTime<Utc>,
) -> MoodRecommendation {
    let preferences = prefs.select_mood(mood, at);
    let movies = select_by_mood(catalog, &preferences, mood);
    MoodRecommendation {
        preferences,
        movies,
    }
}

pub fn recommend_personalized(catalog: &[Movie], prefs: &UserPreferences) -> Vec<Movie> {
    select(catalog, &personalized_filter(prefs))
}

// ============================================================================
// Store-backed entry points
// ============================================================================

async fn query_catalog(store: &dyn Store, filter: &CatalogFilter) -> AppResult<Vec<Movie>> {
    store
        .find_catalog_items(filter, RECOMMENDATION_SORT, RECOMMENDATION_LIMIT as i64, 0)
        .await
}

/// Records the mood selection for `user_id` and returns picks for it.
///
/// The selection is persisted through the store's read-modify-write, so two
/// concurrent picks both count.
pub async fn for_mood(
    store: &dyn Store,
    user_id: Uuid,
    mood: Mood,
    now: DateTime<Utc>,
) -> AppResult<MoodRecommendation> {
    let preferences = store
        .update_preferences(
            user_id,
            Box::new(move |prefs: UserPreferences| Ok(prefs.select_mood(mood, now))),
        )
        .await?;
    let movies = query_catalog(store, &mood_filter(&preferences, mood)).await?;

    tracing::info!(
        user_id = %user_id,
        mood = %mood,
        results = movies.len(),
        "Mood recommendations served"
    );

    Ok(MoodRecommendation {
        preferences,
        movies,
    })
}

pub async fn personalized(store: &dyn Store, user_id: Uuid) -> AppResult<Vec<Movie>> {
    let prefs = store.load_preferences(user_id).await?;
    query_catalog(store, &personalized_filter(&prefs)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Genre, MovieId};
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeSet;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(seconds)
    }

    fn movie(id: i64, rating: f64, genres: &[Genre]) -> Movie {
        Movie {
            id: MovieId(id),
            title: format!("Movie {}", id),
            overview: String::new(),
            poster_url: None,
            backdrop_url: None,
            release_date: None,
            rating,
            vote_count: 100,
            genres: genres.iter().copied().collect(),
            mood_tags: BTreeSet::new(),
            runtime: Some(100),
            language: "en".to_string(),
            popularity: 10.0,
        }
    }

    fn ids(movies: &[Movie]) -> Vec<i64> {
        movies.iter().map(|m| m.id.0).collect()
    }

    #[test]
    fn test_happy_mood_skips_wrong_genre_even_when_higher_rated() {
        let catalog = vec![
            movie(1, 7.5, &[Genre::Comedy]),
            movie(2, 9.0, &[Genre::Horror]),
        ];

        let picks = select_by_mood(&catalog, &UserPreferences::new(), Mood::Happy);
        assert_eq!(ids(&picks), vec![1]);
    }

    #[test]
    fn test_mood_picks_are_ordered_by_rating() {
        let catalog = vec![
            movie(1, 7.0, &[Genre::Comedy]),
            movie(2, 8.0, &[Genre::Family]),
        ];

        let picks = select_by_mood(&catalog, &UserPreferences::new(), Mood::Happy);
        assert_eq!(ids(&picks), vec![2, 1]);
    }

    #[test]
    fn test_mood_tag_alone_qualifies() {
        let mut tagged = movie(1, 7.0, &[Genre::Horror]);
        tagged.mood_tags.insert(Mood::Cozy);

        let picks = select_by_mood(&[tagged], &UserPreferences::new(), Mood::Cozy);
        assert_eq!(ids(&picks), vec![1]);
    }

    #[test]
    fn test_mood_picks_respect_rating_threshold() {
        let catalog = vec![
            movie(1, 5.9, &[Genre::Comedy]),
            movie(2, 6.0, &[Genre::Comedy]),
        ];

        let picks = select_by_mood(&catalog, &UserPreferences::new(), Mood::Happy);
        assert_eq!(ids(&picks), vec![2]);
    }

    #[test]
    fn test_ties_keep_catalog_order_and_popularity_breaks_rating_ties() {
        let mut popular = movie(3, 8.0, &[Genre::Action]);
        popular.popularity = 50.0;
        let catalog = vec![
            movie(1, 8.0, &[Genre::Action]),
            movie(2, 8.0, &[Genre::Fantasy]),
            popular,
        ];

        let picks = select_by_mood(&catalog, &UserPreferences::new(), Mood::Epic);
        assert_eq!(ids(&picks), vec![3, 1, 2]);
    }

    #[test]
    fn test_results_are_limited() {
        let catalog: Vec<Movie> = (0..50)
            .map(|i| movie(i, 7.0 + (i as f64) / 100.0, &[Genre::Drama]))
            .collect();

        let picks = select_by_mood(&catalog, &UserPreferences::new(), Mood::Cozy);
        assert_eq!(picks.len(), RECOMMENDATION_LIMIT);
        assert_eq!(picks[0].id, MovieId(49));
    }

    #[test]
    fn test_empty_catalog_is_not_an_error() {
        assert!(select_by_mood(&[], &UserPreferences::new(), Mood::Epic).is_empty());
        assert!(recommend_personalized(&[], &UserPreferences::new()).is_empty());
    }

    #[test]
    fn test_recommend_by_mood_records_selection() {
        let catalog = vec![movie(1, 8.0, &[Genre::Comedy])];

        let first = recommend_by_mood(&catalog, UserPreferences::new(), Mood::Happy, at(0));
        assert_eq!(first.preferences.mood_weight(Mood::Happy), Some(1.0));
        assert_eq!(ids(&first.movies), vec![1]);

        let second = recommend_by_mood(&catalog, first.preferences, Mood::Happy, at(1));
        let weight = second.preferences.mood_weight(Mood::Happy).unwrap();
        assert!((weight - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_personalized_excludes_disliked_even_when_matching() {
        let prefs = UserPreferences::new()
            .set_favorite_genres([Genre::Drama])
            .dislike(MovieId(1));
        let catalog = vec![
            movie(1, 9.5, &[Genre::Drama]),
            movie(2, 7.0, &[Genre::Drama]),
        ];

        let picks = recommend_personalized(&catalog, &prefs);
        assert_eq!(ids(&picks), vec![2]);
    }

    #[test]
    fn test_personalized_excludes_disliked_in_cold_start() {
        let prefs = UserPreferences::new().dislike(MovieId(1));
        let catalog = vec![movie(1, 9.5, &[Genre::Drama]), movie(2, 7.0, &[])];

        let picks = recommend_personalized(&catalog, &prefs);
        assert_eq!(ids(&picks), vec![2]);
    }

    #[test]
    fn test_personalized_matches_favorite_genres_or_preferred_moods() {
        let prefs = UserPreferences::new()
            .set_favorite_genres([Genre::Horror])
            .select_mood(Mood::Romantic, at(0));

        let mut tagged = movie(3, 7.0, &[Genre::Documentary]);
        tagged.mood_tags.insert(Mood::Romantic);
        let catalog = vec![
            movie(1, 8.0, &[Genre::Horror]),
            movie(2, 8.5, &[Genre::Comedy]),
            tagged,
        ];

        let picks = recommend_personalized(&catalog, &prefs);
        assert_eq!(ids(&picks), vec![1, 3]);
    }

    #[test]
    fn test_personalized_uses_only_top_three_moods() {
        let prefs = UserPreferences::new()
            .select_mood(Mood::Happy, at(0))
            .select_mood(Mood::Cozy, at(1))
            .select_mood(Mood::Epic, at(2))
            .select_mood(Mood::Thriller, at(3))
            .select_mood(Mood::Thriller, at(4));

        // Thriller, then Epic and Cozy by recency; Happy falls off
        let mut happy = movie(1, 8.0, &[]);
        happy.mood_tags.insert(Mood::Happy);
        let mut cozy = movie(2, 8.0, &[]);
        cozy.mood_tags.insert(Mood::Cozy);

        let picks = recommend_personalized(&[happy, cozy], &prefs);
        assert_eq!(ids(&picks), vec![2]);
    }

    #[test]
    fn test_cold_start_returns_everything_above_threshold() {
        let catalog = vec![
            movie(1, 5.0, &[Genre::Horror]),
            movie(2, 6.5, &[Genre::Horror]),
            movie(3, 7.0, &[]),
        ];

        let picks = recommend_personalized(&catalog, &UserPreferences::new());
        assert_eq!(ids(&picks), vec![3, 2]);
    }

    #[test]
    fn test_personalized_filter_shape() {
        let prefs = UserPreferences::new()
            .set_rating_threshold(7.5)
            .unwrap()
            .dislike(MovieId(9));

        let cold = personalized_filter(&prefs);
        assert_eq!(cold.min_rating, Some(7.5));
        assert_eq!(cold.any_of, None);
        assert_eq!(cold.exclude, vec![MovieId(9)]);

        let warm = personalized_filter(&prefs.set_favorite_genres([Genre::Crime]));
        assert_eq!(
            warm.any_of,
            Some(FacetMatch {
                genres: vec![Genre::Crime],
                moods: vec![],
            })
        );
    }

    mod with_store {
        use super::*;
        use crate::db::MemoryStore;
        use crate::error::AppError;
        use crate::models::User;

        async fn setup(catalog: Vec<Movie>) -> (MemoryStore, Uuid) {
            let store = MemoryStore::with_movies(catalog);
            let user = User {
                id: Uuid::new_v4(),
                email: "viewer@example.com".to_string(),
                username: "viewer".to_string(),
                first_name: None,
                last_name: None,
                avatar: None,
                created_at: at(0),
            };
            let user_id = user.id;
            store.create_user(user).await.unwrap();
            (store, user_id)
        }

        #[tokio::test]
        async fn test_for_mood_persists_selection() {
            let (store, user_id) = setup(vec![
                movie(1, 7.5, &[Genre::Comedy]),
                movie(2, 9.0, &[Genre::Horror]),
            ])
            .await;

            let first = for_mood(&store, user_id, Mood::Happy, at(0)).await.unwrap();
            assert_eq!(ids(&first.movies), vec![1]);

            for_mood(&store, user_id, Mood::Happy, at(1)).await.unwrap();
            let stored = store.load_preferences(user_id).await.unwrap();
            let weight = stored.mood_weight(Mood::Happy).unwrap();
            assert!((weight - 1.1).abs() < 1e-9);
            assert_eq!(stored.mood_preferences[0].last_selected_at, at(1));
        }

        #[tokio::test]
        async fn test_personalized_matches_in_memory_selection() {
            let catalog = vec![
                movie(1, 9.5, &[Genre::Drama]),
                movie(2, 7.0, &[Genre::Drama]),
                movie(3, 8.0, &[Genre::Action]),
            ];
            let (store, user_id) = setup(catalog.clone()).await;
            let prefs = store
                .update_preferences(
                    user_id,
                    Box::new(|prefs: UserPreferences| {
                        Ok(prefs.set_favorite_genres([Genre::Drama]).dislike(MovieId(1)))
                    }),
                )
                .await
                .unwrap();

            let picks = personalized(&store, user_id).await.unwrap();
            assert_eq!(picks, recommend_personalized(&catalog, &prefs));
            assert_eq!(ids(&picks), vec![2]);
        }

        #[tokio::test]
        async fn test_unknown_user_is_not_found() {
            let (store, _) = setup(vec![]).await;
            let result = for_mood(&store, Uuid::new_v4(), Mood::Epic, at(0)).await;
            assert!(matches!(result, Err(AppError::NotFound(_))));
        }
    }
}
