use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{PreferencesUpdate, Store};
use crate::{
    error::{AppError, AppResult},
    models::{
        CatalogFilter, CatalogSort, Movie, MovieId, MovieNight, MovieNightWindow, MovieSummary,
        User, UserPreferences,
    },
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, (User, UserPreferences)>,
    /// Catalog order is ascending id, as in the `movies` table
    movies: Vec<Movie>,
    movie_nights: HashMap<Uuid, MovieNight>,
}

/// Store held entirely in process memory, for tests and database-less runs
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose local catalog holds `movies`
    pub fn with_movies(mut movies: Vec<Movie>) -> Self {
        movies.sort_by_key(|m| m.id);
        Self {
            tables: RwLock::new(Tables {
                movies,
                ..Default::default()
            }),
        }
    }
}

fn user_not_found(user_id: Uuid) -> AppError {
    AppError::NotFound(format!("User {} not found", user_id))
}

fn movie_night_not_found(night_id: Uuid) -> AppError {
    AppError::NotFound(format!("Movie night {} not found", night_id))
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: User) -> AppResult<User> {
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|(u, _)| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        if tables.users.values().any(|(u, _)| u.username == user.username) {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        tables
            .users
            .insert(user.id, (user.clone(), UserPreferences::new()));
        Ok(user)
    }

    async fn find_user(&self, user_id: Uuid) -> AppResult<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(&user_id)
            .map(|(user, _)| user.clone())
            .ok_or_else(|| user_not_found(user_id))
    }

    async fn load_preferences(&self, user_id: Uuid) -> AppResult<UserPreferences> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(&user_id)
            .map(|(_, prefs)| prefs.clone())
            .ok_or_else(|| user_not_found(user_id))
    }

    async fn save_preferences(&self, user_id: Uuid, prefs: &UserPreferences) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let (_, stored) = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        *stored = prefs.clone();
        Ok(())
    }

    async fn update_preferences(
        &self,
        user_id: Uuid,
        update: PreferencesUpdate,
    ) -> AppResult<UserPreferences> {
        let mut tables = self.tables.write().await;
        let (_, stored) = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| user_not_found(user_id))?;

        let updated = update(stored.clone())?;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn find_catalog_items(
        &self,
        filter: &CatalogFilter,
        sort: CatalogSort,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Movie>> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Movie> = tables.movies.iter().filter(|m| filter.matches(m)).collect();
        matching.sort_by(|a, b| sort.compare(a, b));

        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count_catalog_items(&self, filter: &CatalogFilter) -> AppResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.movies.iter().filter(|m| filter.matches(m)).count() as i64)
    }

    async fn find_movie(&self, movie_id: MovieId) -> AppResult<Option<Movie>> {
        let tables = self.tables.read().await;
        Ok(tables.movies.iter().find(|m| m.id == movie_id).cloned())
    }

    async fn insert_movie_night(&self, night: MovieNight) -> AppResult<MovieNight> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&night.host_id) {
            return Err(user_not_found(night.host_id));
        }
        tables.movie_nights.insert(night.id, night.clone());
        Ok(night)
    }

    async fn find_movie_night(&self, host_id: Uuid, night_id: Uuid) -> AppResult<MovieNight> {
        let tables = self.tables.read().await;
        tables
            .movie_nights
            .get(&night_id)
            .filter(|night| night.host_id == host_id)
            .cloned()
            .ok_or_else(|| movie_night_not_found(night_id))
    }

    async fn update_movie_night(&self, night: &MovieNight) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .movie_nights
            .get_mut(&night.id)
            .filter(|stored| stored.host_id == night.host_id)
            .ok_or_else(|| movie_night_not_found(night.id))?;

        let movies = std::mem::take(&mut stored.movies);
        *stored = MovieNight {
            movies,
            ..night.clone()
        };
        Ok(())
    }

    async fn delete_movie_night(&self, host_id: Uuid, night_id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let owned = tables
            .movie_nights
            .get(&night_id)
            .is_some_and(|night| night.host_id == host_id);
        if !owned {
            return Err(movie_night_not_found(night_id));
        }
        tables.movie_nights.remove(&night_id);
        Ok(())
    }

    async fn list_movie_nights(
        &self,
        host_id: Uuid,
        window: MovieNightWindow,
        today: NaiveDate,
    ) -> AppResult<Vec<MovieNight>> {
        let tables = self.tables.read().await;
        let mut nights: Vec<MovieNight> = tables
            .movie_nights
            .values()
            .filter(|night| night.host_id == host_id && window.contains(night.date, today))
            .cloned()
            .collect();
        nights.sort_by(|a, b| (a.date, &a.time).cmp(&(b.date, &b.time)));
        Ok(nights)
    }

    async fn attach_movies(&self, night_id: Uuid, movies: &[MovieSummary]) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let night = tables
            .movie_nights
            .get_mut(&night_id)
            .ok_or_else(|| movie_night_not_found(night_id))?;

        for movie in movies {
            if !night.has_movie(movie.id) {
                night.movies.push(movie.clone());
            }
        }
        Ok(())
    }
}
