use chrono::NaiveDate;
use serde::Deserialize;

pub mod movie;
pub mod movie_night;
pub mod preferences;
pub mod user;

pub use movie::{
    CatalogCategory, CatalogFilter, CatalogPage, CatalogQuery, CatalogSort, FacetMatch, Genre,
    Mood, Movie, MovieId, MovieSummary,
};
pub use movie_night::{
    Guest, GuestStatus, MovieNight, MovieNightDraft, MovieNightPatch, MovieNightStatus,
    MovieNightTheme, MovieNightWindow,
};
pub use preferences::{MoodPreference, UserPreferences};
pub use user::{NewUser, User};

// ============================================================================
// TMDB API Types
// ============================================================================

const POSTER_SIZE: &str = "w500";
const BACKDROP_SIZE: &str = "w1280";

/// Raw movie entry from any TMDB list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: i64,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub original_language: Option<String>,
}

impl TmdbMovie {
    /// Converts to a catalog item, resolving image paths against `image_base`
    pub fn into_movie(self, image_base: &str) -> Movie {
        let image = |path: Option<String>, size: &str| {
            path.filter(|p| !p.is_empty())
                .map(|p| format!("{}/{}{}", image_base, size, p))
        };

        Movie {
            id: MovieId(self.id),
            title: self.title,
            overview: self
                .overview
                .filter(|o| !o.is_empty())
                .unwrap_or_else(|| "No description available".to_string()),
            poster_url: image(self.poster_path, POSTER_SIZE),
            backdrop_url: image(self.backdrop_path, BACKDROP_SIZE),
            // TMDB sends "" for unknown dates
            release_date: self
                .release_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            rating: self.vote_average,
            vote_count: self.vote_count,
            genres: self
                .genre_ids
                .into_iter()
                .filter_map(Genre::from_tmdb_id)
                .collect(),
            mood_tags: Default::default(),
            runtime: None,
            language: self.original_language.unwrap_or_else(|| "en".to_string()),
            popularity: self.popularity,
        }
    }
}

/// Paged list response shared by TMDB's discover, search, trending and list endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPage {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<TmdbMovie>,
    #[serde(default = "first_page")]
    pub total_pages: u32,
}

fn first_page() -> u32 {
    1
}

impl TmdbPage {
    pub fn into_catalog_page(self, image_base: &str) -> CatalogPage {
        CatalogPage {
            movies: self
                .results
                .into_iter()
                .map(|m| m.into_movie(image_base))
                .collect(),
            total_pages: self.total_pages.max(1),
            page: self.page,
        }
    }
}
