use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        CatalogFilter, CatalogSort, Movie, MovieId, MovieNight, MovieNightWindow, MovieSummary,
        User, UserPreferences,
    },
};

/// A read-modify-write step over one user's preferences
pub type PreferencesUpdate =
    Box<dyn FnOnce(UserPreferences) -> AppResult<UserPreferences> + Send>;

/// Persistence adapter
///
/// Lookups of a single user-owned record fail with `NotFound` when the record
/// does not exist or belongs to someone else.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Inserts a new user with default preferences. Duplicate email or
    /// username is a `Conflict`.
    async fn create_user(&self, user: User) -> AppResult<User>;

    async fn find_user(&self, user_id: Uuid) -> AppResult<User>;

    async fn load_preferences(&self, user_id: Uuid) -> AppResult<UserPreferences>;

    async fn save_preferences(&self, user_id: Uuid, prefs: &UserPreferences) -> AppResult<()>;

    /// Applies `update` to the stored preferences and saves the result.
    ///
    /// Implementations that can should hold the user's preferences exclusively
    /// for the whole round trip. If `update` fails nothing is written.
    async fn update_preferences(
        &self,
        user_id: Uuid,
        update: PreferencesUpdate,
    ) -> AppResult<UserPreferences> {
        let current = self.load_preferences(user_id).await?;
        let updated = update(current)?;
        self.save_preferences(user_id, &updated).await?;
        Ok(updated)
    }

    /// Local catalog items matching `filter`, ordered by `sort`
    async fn find_catalog_items(
        &self,
        filter: &CatalogFilter,
        sort: CatalogSort,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Movie>>;

    async fn count_catalog_items(&self, filter: &CatalogFilter) -> AppResult<i64>;

    async fn find_movie(&self, movie_id: MovieId) -> AppResult<Option<Movie>>;

    async fn insert_movie_night(&self, night: MovieNight) -> AppResult<MovieNight>;

    async fn find_movie_night(&self, host_id: Uuid, night_id: Uuid) -> AppResult<MovieNight>;

    /// Overwrites every field except the attached movies
    async fn update_movie_night(&self, night: &MovieNight) -> AppResult<()>;

    async fn delete_movie_night(&self, host_id: Uuid, night_id: Uuid) -> AppResult<()>;

    /// The host's events in `window`, ordered by date then time
    async fn list_movie_nights(
        &self,
        host_id: Uuid,
        window: MovieNightWindow,
        today: NaiveDate,
    ) -> AppResult<Vec<MovieNight>>;

    /// Appends movies to an event, skipping any already attached
    async fn attach_movies(&self, night_id: Uuid, movies: &[MovieSummary]) -> AppResult<()>;
}
