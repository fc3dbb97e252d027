use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{Genre, Mood, MovieId};
use crate::error::{AppError, AppResult};

/// Weight a mood starts with the first time it is selected
pub const INITIAL_MOOD_WEIGHT: f64 = 1.0;
/// Added to a mood's weight on every further selection
pub const MOOD_WEIGHT_STEP: f64 = 0.1;
pub const MAX_MOOD_WEIGHT: f64 = 5.0;
pub const DEFAULT_RATING_THRESHOLD: f64 = 6.0;
pub const MAX_RATING: f64 = 10.0;

/// How strongly a user leans towards a mood
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoodPreference {
    pub mood: Mood,
    pub weight: f64,
    pub last_selected_at: DateTime<Utc>,
}

/// Everything a user has told us about their taste.
///
/// Transforms take the aggregate by value and hand back the new one, so a
/// failed transform leaves the caller's copy untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub favorite_genres: BTreeSet<Genre>,
    /// Unique by mood, in first-selected order
    pub mood_preferences: Vec<MoodPreference>,
    pub liked_movies: BTreeSet<MovieId>,
    pub disliked_movies: BTreeSet<MovieId>,
    pub watchlist: BTreeSet<MovieId>,
    pub rating_threshold: f64,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self::new()
    }
}

impl UserPreferences {
    /// Creates preferences with every default in place
    pub fn new() -> Self {
        Self {
            favorite_genres: BTreeSet::new(),
            mood_preferences: Vec::new(),
            liked_movies: BTreeSet::new(),
            disliked_movies: BTreeSet::new(),
            watchlist: BTreeSet::new(),
            rating_threshold: DEFAULT_RATING_THRESHOLD,
        }
    }

    /// Records a mood selection: bumps an existing weight (capped) or starts a new entry
    pub fn select_mood(mut self, mood: Mood, at: DateTime<Utc>) -> Self {
        if let Some(existing) = self.mood_preferences.iter_mut().find(|p| p.mood == mood) {
            existing.weight = (existing.weight + MOOD_WEIGHT_STEP).min(MAX_MOOD_WEIGHT);
            existing.last_selected_at = at;
        } else {
            self.mood_preferences.push(MoodPreference {
                mood,
                weight: INITIAL_MOOD_WEIGHT,
                last_selected_at: at,
            });
        }
        self
    }

    pub fn like(mut self, movie_id: MovieId) -> Self {
        self.disliked_movies.remove(&movie_id);
        self.liked_movies.insert(movie_id);
        self
    }

    pub fn dislike(mut self, movie_id: MovieId) -> Self {
        self.liked_movies.remove(&movie_id);
        self.disliked_movies.insert(movie_id);
        self
    }

    /// `like` when `liked`, `dislike` otherwise
    pub fn rate(self, movie_id: MovieId, liked: bool) -> Self {
        if liked {
            self.like(movie_id)
        } else {
            self.dislike(movie_id)
        }
    }

    /// Idempotent in both directions
    pub fn toggle_watchlist(mut self, movie_id: MovieId, add: bool) -> Self {
        if add {
            self.watchlist.insert(movie_id);
        } else {
            self.watchlist.remove(&movie_id);
        }
        self
    }

    pub fn set_rating_threshold(mut self, value: f64) -> AppResult<Self> {
        if !(0.0..=MAX_RATING).contains(&value) {
            return Err(AppError::InvalidInput(format!(
                "Rating threshold must be between 0 and {}, got {}",
                MAX_RATING, value
            )));
        }
        self.rating_threshold = value;
        Ok(self)
    }

    pub fn set_favorite_genres(mut self, genres: impl IntoIterator<Item = Genre>) -> Self {
        self.favorite_genres = genres.into_iter().collect();
        self
    }

    pub fn mood_weight(&self, mood: Mood) -> Option<f64> {
        self.mood_preferences
            .iter()
            .find(|p| p.mood == mood)
            .map(|p| p.weight)
    }

    /// Mood preferences, heaviest first; ties go to the most recently selected
    pub fn moods_by_weight(&self) -> Vec<MoodPreference> {
        let mut ranked = self.mood_preferences.clone();
        ranked.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| b.last_selected_at.cmp(&a.last_selected_at))
        });
        ranked
    }

    /// The `n` heaviest moods
    pub fn preferred_moods(&self, n: usize) -> Vec<Mood> {
        self.moods_by_weight()
            .into_iter()
            .take(n)
            .map(|p| p.mood)
            .collect()
    }
}
