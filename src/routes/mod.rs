use axum::{
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::{
    make_span_with_request_id, request_id_middleware, REQUEST_ID_HEADER, USER_ID_HEADER,
};

pub mod movie_nights;
pub mod movies;
pub mod preferences;
pub mod recommendations;
pub mod state;
pub mod users;

pub use state::AppState;

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
}

/// API routes under /api
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Users
        .route("/users", post(users::register))
        .route("/users/me", get(users::me))
        // Catalog
        .route("/movies", get(movies::browse_live))
        .route("/movies/search", get(movies::search))
        .route("/movies/browse/popular", get(movies::browse_popular))
        .route("/movies/browse/top-rated", get(movies::browse_top_rated))
        .route("/movies/browse/genre/:genre", get(movies::browse_genre))
        .route("/movies/:id", get(movies::get_movie))
        // Recommendations
        .route("/recommendations/mood/:mood", get(recommendations::by_mood))
        .route(
            "/recommendations/personalized",
            get(recommendations::personalized),
        )
        .route(
            "/recommendations/movie/:id/like",
            post(recommendations::rate_movie),
        )
        .route(
            "/recommendations/movie/:id/watchlist",
            post(recommendations::watchlist),
        )
        .route(
            "/recommendations/mood-preferences",
            get(recommendations::mood_preferences),
        )
        // Preferences
        .route("/preferences", get(preferences::get_preferences))
        .route(
            "/preferences/rating-threshold",
            put(preferences::set_rating_threshold),
        )
        .route("/preferences/genres", put(preferences::set_favorite_genres))
        // Movie nights
        .route(
            "/movie-nights",
            get(movie_nights::list).post(movie_nights::create),
        )
        .route(
            "/movie-nights/:id",
            put(movie_nights::update).delete(movie_nights::delete),
        )
        .route("/movie-nights/:id/movies", post(movie_nights::add_movies))
}

/// CORS for the configured browser origins. Origins that are not valid
/// header values are skipped.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
