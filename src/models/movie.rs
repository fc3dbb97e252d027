use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use crate::error::AppError;

/// TMDB movie identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(pub i64);

impl Display for MovieId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog genre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Action,
    Adventure,
    Comedy,
    Crime,
    Documentary,
    Drama,
    Family,
    Fantasy,
    Horror,
    Mystery,
    Romance,
    #[serde(rename = "sci-fi")]
    SciFi,
    Thriller,
}

impl Genre {
    pub const ALL: [Genre; 13] = [
        Genre::Action,
        Genre::Adventure,
        Genre::Comedy,
        Genre::Crime,
        Genre::Documentary,
        Genre::Drama,
        Genre::Family,
        Genre::Fantasy,
        Genre::Horror,
        Genre::Mystery,
        Genre::Romance,
        Genre::SciFi,
        Genre::Thriller,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Action => "action",
            Genre::Adventure => "adventure",
            Genre::Comedy => "comedy",
            Genre::Crime => "crime",
            Genre::Documentary => "documentary",
            Genre::Drama => "drama",
            Genre::Family => "family",
            Genre::Fantasy => "fantasy",
            Genre::Horror => "horror",
            Genre::Mystery => "mystery",
            Genre::Romance => "romance",
            Genre::SciFi => "sci-fi",
            Genre::Thriller => "thriller",
        }
    }

    /// TMDB's numeric genre id
    pub fn tmdb_id(&self) -> u32 {
        match self {
            Genre::Action => 28,
            Genre::Adventure => 12,
            Genre::Comedy => 35,
            Genre::Crime => 80,
            Genre::Documentary => 99,
            Genre::Drama => 18,
            Genre::Family => 10751,
            Genre::Fantasy => 14,
            Genre::Horror => 27,
            Genre::Mystery => 9648,
            Genre::Romance => 10749,
            Genre::SciFi => 878,
            Genre::Thriller => 53,
        }
    }

    /// Genres TMDB knows but this catalog does not track map to `None`
    pub fn from_tmdb_id(id: u32) -> Option<Genre> {
        Genre::ALL.into_iter().find(|genre| genre.tmdb_id() == id)
    }
}

impl Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Genre {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Genre::ALL
            .into_iter()
            .find(|genre| genre.as_str() == normalized)
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid genre: {}", s)))
    }
}

/// Coarse recommendation facet picked by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Thriller,
    Cozy,
    Mindbending,
    Romantic,
    Epic,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Happy,
        Mood::Thriller,
        Mood::Cozy,
        Mood::Mindbending,
        Mood::Romantic,
        Mood::Epic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Thriller => "thriller",
            Mood::Cozy => "cozy",
            Mood::Mindbending => "mindbending",
            Mood::Romantic => "romantic",
            Mood::Epic => "epic",
        }
    }

    /// Genres that count as matching this mood
    pub fn genres(&self) -> &'static [Genre] {
        match self {
            Mood::Happy => &[Genre::Comedy, Genre::Adventure, Genre::Family],
            Mood::Thriller => &[Genre::Thriller, Genre::Mystery, Genre::Crime],
            Mood::Cozy => &[Genre::Drama, Genre::Romance, Genre::Documentary],
            Mood::Mindbending => &[Genre::SciFi, Genre::Mystery, Genre::Thriller],
            Mood::Romantic => &[Genre::Romance, Genre::Drama, Genre::Comedy],
            Mood::Epic => &[Genre::Action, Genre::Adventure, Genre::Fantasy],
        }
    }
}

impl Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Mood::ALL
            .into_iter()
            .find(|mood| mood.as_str() == normalized)
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid mood: {}", s)))
    }
}

/// A catalog item, either live from TMDB or from the local `movies` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub overview: String,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub rating: f64,
    pub vote_count: i64,
    pub genres: BTreeSet<Genre>,
    pub mood_tags: BTreeSet<Mood>,
    pub runtime: Option<i32>,
    pub language: String,
    pub popularity: f64,
}

/// The slice of a movie shown inside a movie night
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummary {
    pub id: MovieId,
    pub title: String,
    pub poster_url: Option<String>,
    pub rating: f64,
}

impl From<&Movie> for MovieSummary {
    fn from(movie: &Movie) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            poster_url: movie.poster_url.clone(),
            rating: movie.rating,
        }
    }
}

// ============================================================================
// Local catalog queries
// ============================================================================

/// Matches items sharing at least one genre or mood with the given sets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetMatch {
    pub genres: Vec<Genre>,
    pub moods: Vec<Mood>,
}

impl FacetMatch {
    fn matches(&self, movie: &Movie) -> bool {
        self.genres.iter().any(|genre| movie.genres.contains(genre))
            || self.moods.iter().any(|mood| movie.mood_tags.contains(mood))
    }
}

/// Conjunction of optional clauses over the local catalog.
///
/// Evaluated in memory by [`CatalogFilter::matches`] and translated to SQL by
/// the Postgres store; the two must agree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
    /// Case-insensitive substring of title or overview
    pub text: Option<String>,
    pub genre: Option<Genre>,
    pub mood: Option<Mood>,
    pub min_rating: Option<f64>,
    pub any_of: Option<FacetMatch>,
    pub exclude: Vec<MovieId>,
}

impl CatalogFilter {
    pub fn matches(&self, movie: &Movie) -> bool {
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            if !movie.title.to_lowercase().contains(&needle)
                && !movie.overview.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        if let Some(genre) = self.genre {
            if !movie.genres.contains(&genre) {
                return false;
            }
        }

        if let Some(mood) = self.mood {
            if !movie.mood_tags.contains(&mood) {
                return false;
            }
        }

        if let Some(min_rating) = self.min_rating {
            if movie.rating < min_rating {
                return false;
            }
        }

        if let Some(any_of) = &self.any_of {
            if !any_of.matches(movie) {
                return false;
            }
        }

        !self.exclude.contains(&movie.id)
    }
}

/// Orderings offered by the local catalog. Sorts are stable, so ties keep
/// catalog order; both stores iterate the catalog by ascending id, which the
/// SQL renders as a trailing `id ASC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSort {
    RatingThenPopularity,
    PopularityThenRating,
    RatingThenVotes,
}

impl CatalogSort {
    pub fn compare(&self, a: &Movie, b: &Movie) -> std::cmp::Ordering {
        match self {
            CatalogSort::RatingThenPopularity => b
                .rating
                .total_cmp(&a.rating)
                .then_with(|| b.popularity.total_cmp(&a.popularity)),
            CatalogSort::PopularityThenRating => b
                .popularity
                .total_cmp(&a.popularity)
                .then_with(|| b.rating.total_cmp(&a.rating)),
            CatalogSort::RatingThenVotes => b
                .rating
                .total_cmp(&a.rating)
                .then_with(|| b.vote_count.cmp(&a.vote_count)),
        }
    }

    pub fn order_by_sql(&self) -> &'static str {
        match self {
            CatalogSort::RatingThenPopularity => "rating DESC, popularity DESC, id ASC",
            CatalogSort::PopularityThenRating => "popularity DESC, rating DESC, id ASC",
            CatalogSort::RatingThenVotes => "rating DESC, vote_count DESC, id ASC",
        }
    }
}

// ============================================================================
// Live catalog queries
// ============================================================================

/// Curated TMDB lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogCategory {
    Popular,
    TopRated,
    NowPlaying,
    Upcoming,
    Trending,
}

impl CatalogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogCategory::Popular => "popular",
            CatalogCategory::TopRated => "top_rated",
            CatalogCategory::NowPlaying => "now_playing",
            CatalogCategory::Upcoming => "upcoming",
            CatalogCategory::Trending => "trending",
        }
    }
}

/// A live browse request against the upstream catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub category: Option<CatalogCategory>,
    pub search: Option<String>,
    pub genre: Option<Genre>,
    pub page: u32,
}

impl CatalogQuery {
    /// Resolves the upstream endpoint and its query-specific parameters.
    ///
    /// Precedence: category, then search, then discover.
    pub fn endpoint(&self) -> (String, Vec<(&'static str, String)>) {
        if let Some(category) = self.category {
            let path = match category {
                CatalogCategory::Trending => "/trending/movie/week".to_string(),
                other => format!("/movie/{}", other.as_str()),
            };
            return (path, Vec::new());
        }

        if let Some(search) = &self.search {
            return ("/search/movie".to_string(), vec![("query", search.clone())]);
        }

        let mut params = vec![("sort_by", "popularity.desc".to_string())];
        if let Some(genre) = self.genre {
            params.push(("with_genres", genre.tmdb_id().to_string()));
        }
        ("/discover/movie".to_string(), params)
    }
}

/// One page of live catalog results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
    pub movies: Vec<Movie>,
    pub total_pages: u32,
    pub page: u32,
}
