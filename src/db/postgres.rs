use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use super::store::{PreferencesUpdate, Store};
use crate::{
    error::{AppError, AppResult},
    models::{
        CatalogFilter, CatalogSort, Guest, Movie, MovieId, MovieNight, MovieNightWindow,
        MovieSummary, User, UserPreferences,
    },
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies pending migrations from `migrations/`
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, avatar, created_at";

const MOVIE_COLUMNS: &str = "id, title, overview, poster_url, backdrop_url, release_date, \
     rating, vote_count, genres, mood_tags, runtime, language, popularity";

const MOVIE_NIGHT_COLUMNS: &str =
    "id, host_id, title, date, time, guests, theme, notes, status, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar: row.avatar,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct MovieRow {
    id: i64,
    title: String,
    overview: String,
    poster_url: Option<String>,
    backdrop_url: Option<String>,
    release_date: Option<NaiveDate>,
    rating: f64,
    vote_count: i64,
    genres: Vec<String>,
    mood_tags: Vec<String>,
    runtime: Option<i32>,
    language: String,
    popularity: f64,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Self {
            id: MovieId(row.id),
            title: row.title,
            overview: row.overview,
            poster_url: row.poster_url,
            backdrop_url: row.backdrop_url,
            release_date: row.release_date,
            rating: row.rating,
            vote_count: row.vote_count,
            // Labels this build does not know are skipped
            genres: row.genres.iter().filter_map(|g| g.parse().ok()).collect(),
            mood_tags: row.mood_tags.iter().filter_map(|m| m.parse().ok()).collect(),
            runtime: row.runtime,
            language: row.language,
            popularity: row.popularity,
        }
    }
}

#[derive(FromRow)]
struct MovieNightRow {
    id: Uuid,
    host_id: Uuid,
    title: String,
    date: NaiveDate,
    time: String,
    guests: Json<Vec<Guest>>,
    theme: Option<String>,
    notes: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MovieNightRow {
    fn into_movie_night(self, movies: Vec<MovieSummary>) -> AppResult<MovieNight> {
        let corrupt = |e: AppError| {
            AppError::Internal(format!("Stored movie night {} is invalid: {}", self.id, e))
        };

        Ok(MovieNight {
            id: self.id,
            host_id: self.host_id,
            title: self.title,
            date: self.date,
            time: self.time,
            guests: self.guests.0,
            movies,
            theme: self
                .theme
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(corrupt)?,
            notes: self.notes,
            status: self.status.parse().map_err(corrupt)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AttachedMovieRow {
    movie_night_id: Uuid,
    id: i64,
    title: String,
    poster_url: Option<String>,
    rating: f64,
}

/// Escapes LIKE wildcards so user text matches literally
fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Appends the SQL equivalent of `CatalogFilter::matches`
fn push_catalog_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &CatalogFilter) {
    qb.push(" WHERE TRUE");

    if let Some(text) = &filter.text {
        let pattern = format!("%{}%", escape_like(text));
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR overview ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(genre) = filter.genre {
        qb.push(" AND ")
            .push_bind(genre.as_str())
            .push(" = ANY(genres)");
    }

    if let Some(mood) = filter.mood {
        qb.push(" AND ")
            .push_bind(mood.as_str())
            .push(" = ANY(mood_tags)");
    }

    if let Some(min_rating) = filter.min_rating {
        qb.push(" AND rating >= ").push_bind(min_rating);
    }

    if let Some(any_of) = &filter.any_of {
        let genres: Vec<String> = any_of.genres.iter().map(|g| g.as_str().to_string()).collect();
        let moods: Vec<String> = any_of.moods.iter().map(|m| m.as_str().to_string()).collect();
        qb.push(" AND (genres && ")
            .push_bind(genres)
            .push("::text[] OR mood_tags && ")
            .push_bind(moods)
            .push("::text[])");
    }

    if !filter.exclude.is_empty() {
        let ids: Vec<i64> = filter.exclude.iter().map(|id| id.0).collect();
        qb.push(" AND NOT (id = ANY(").push_bind(ids).push("))");
    }
}

/// Maps constraint violations on user-owned rows to client errors
fn map_constraint_violation(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let message = match db_err.constraint() {
                Some("users_email_key") => "Email already registered",
                Some("users_username_key") => "Username already taken",
                _ => "Record already exists",
            };
            return AppError::Conflict(message.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return AppError::NotFound("Referenced record not found".to_string());
        }
    }
    AppError::Database(e)
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attached movies for each of `night_ids`, in the order they were added
    async fn attached_movies(
        &self,
        night_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, Vec<MovieSummary>>> {
        let rows: Vec<AttachedMovieRow> = sqlx::query_as(
            r#"
            SELECT mnm.movie_night_id, m.id, m.title, m.poster_url, m.rating
            FROM movie_night_movies mnm
            JOIN movies m ON m.id = mnm.movie_id
            WHERE mnm.movie_night_id = ANY($1)
            ORDER BY mnm.added_at, m.id
            "#,
        )
        .bind(night_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_night: HashMap<Uuid, Vec<MovieSummary>> = HashMap::new();
        for row in rows {
            by_night
                .entry(row.movie_night_id)
                .or_default()
                .push(MovieSummary {
                    id: MovieId(row.id),
                    title: row.title,
                    poster_url: row.poster_url,
                    rating: row.rating,
                });
        }
        Ok(by_night)
    }

    async fn hydrate(&self, rows: Vec<MovieNightRow>) -> AppResult<Vec<MovieNight>> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut movies = self.attached_movies(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let attached = movies.remove(&row.id).unwrap_or_default();
                row.into_movie_night(attached)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: User) -> AppResult<User> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (id, email, username, first_name, last_name, avatar, preferences, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.avatar)
        .bind(Json(UserPreferences::new()))
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_constraint_violation)?;

        Ok(row.into())
    }

    async fn find_user(&self, user_id: Uuid) -> AppResult<User> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(User::from)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    async fn load_preferences(&self, user_id: Uuid) -> AppResult<UserPreferences> {
        let row: Option<(Json<UserPreferences>,)> =
            sqlx::query_as("SELECT preferences FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(Json(prefs),)| prefs)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    async fn save_preferences(&self, user_id: Uuid, prefs: &UserPreferences) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET preferences = $2 WHERE id = $1")
            .bind(user_id)
            .bind(Json(prefs))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn update_preferences(
        &self,
        user_id: Uuid,
        update: PreferencesUpdate,
    ) -> AppResult<UserPreferences> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(Json<UserPreferences>,)> =
            sqlx::query_as("SELECT preferences FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (Json(current),) =
            row.ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        // Dropping `tx` on error rolls back and releases the row lock
        let updated = update(current)?;

        sqlx::query("UPDATE users SET preferences = $2 WHERE id = $1")
            .bind(user_id)
            .bind(Json(&updated))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(updated)
    }

    async fn find_catalog_items(
        &self,
        filter: &CatalogFilter,
        sort: CatalogSort,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Movie>> {
        let mut qb = QueryBuilder::new(format!("SELECT {} FROM movies", MOVIE_COLUMNS));
        push_catalog_filter(&mut qb, filter);
        qb.push(" ORDER BY ")
            .push(sort.order_by_sql())
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<MovieRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Movie::from).collect())
    }

    async fn count_catalog_items(&self, filter: &CatalogFilter) -> AppResult<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM movies");
        push_catalog_filter(&mut qb, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn find_movie(&self, movie_id: MovieId) -> AppResult<Option<Movie>> {
        let row: Option<MovieRow> =
            sqlx::query_as(&format!("SELECT {} FROM movies WHERE id = $1", MOVIE_COLUMNS))
                .bind(movie_id.0)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Movie::from))
    }

    async fn insert_movie_night(&self, night: MovieNight) -> AppResult<MovieNight> {
        sqlx::query(
            r#"
            INSERT INTO movie_nights
                (id, host_id, title, date, time, guests, theme, notes, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(night.id)
        .bind(night.host_id)
        .bind(&night.title)
        .bind(night.date)
        .bind(&night.time)
        .bind(Json(&night.guests))
        .bind(night.theme.map(|t| t.as_str()))
        .bind(&night.notes)
        .bind(night.status.as_str())
        .bind(night.created_at)
        .bind(night.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_constraint_violation)?;

        Ok(night)
    }

    async fn find_movie_night(&self, host_id: Uuid, night_id: Uuid) -> AppResult<MovieNight> {
        let row: Option<MovieNightRow> = sqlx::query_as(&format!(
            "SELECT {} FROM movie_nights WHERE id = $1 AND host_id = $2",
            MOVIE_NIGHT_COLUMNS
        ))
        .bind(night_id)
        .bind(host_id)
        .fetch_optional(&self.pool)
        .await?;

        let row =
            row.ok_or_else(|| AppError::NotFound(format!("Movie night {} not found", night_id)))?;
        let mut nights = self.hydrate(vec![row]).await?;
        nights
            .pop()
            .ok_or_else(|| AppError::Internal("Movie night vanished while loading".to_string()))
    }

    async fn update_movie_night(&self, night: &MovieNight) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE movie_nights
            SET title = $3, date = $4, time = $5, guests = $6, theme = $7,
                notes = $8, status = $9, updated_at = $10
            WHERE id = $1 AND host_id = $2
            "#,
        )
        .bind(night.id)
        .bind(night.host_id)
        .bind(&night.title)
        .bind(night.date)
        .bind(&night.time)
        .bind(Json(&night.guests))
        .bind(night.theme.map(|t| t.as_str()))
        .bind(&night.notes)
        .bind(night.status.as_str())
        .bind(night.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Movie night {} not found",
                night.id
            )));
        }
        Ok(())
    }

    async fn delete_movie_night(&self, host_id: Uuid, night_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM movie_nights WHERE id = $1 AND host_id = $2")
            .bind(night_id)
            .bind(host_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Movie night {} not found",
                night_id
            )));
        }
        Ok(())
    }

    async fn list_movie_nights(
        &self,
        host_id: Uuid,
        window: MovieNightWindow,
        today: NaiveDate,
    ) -> AppResult<Vec<MovieNight>> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM movie_nights WHERE host_id = ",
            MOVIE_NIGHT_COLUMNS
        ));
        qb.push_bind(host_id);
        match window {
            MovieNightWindow::Upcoming => {
                qb.push(" AND date >= ").push_bind(today);
            }
            MovieNightWindow::Past => {
                qb.push(" AND date < ").push_bind(today);
            }
            MovieNightWindow::All => {}
        }
        qb.push(" ORDER BY date, time");

        let rows: Vec<MovieNightRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        self.hydrate(rows).await
    }

    async fn attach_movies(&self, night_id: Uuid, movies: &[MovieSummary]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        for movie in movies {
            sqlx::query(
                r#"
                INSERT INTO movie_night_movies (movie_night_id, movie_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(night_id)
            .bind(movie.id.0)
            .execute(&mut *tx)
            .await
            .map_err(map_constraint_violation)?;
        }

        tx.commit().await?;
        Ok(())
    }
}
