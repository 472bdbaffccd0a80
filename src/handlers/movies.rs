use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;

use crate::api::{ApiResult, Envelope, JsonBody};
use crate::database::models::{validate_movie, Movie, MOVIE_SORT_SAFELIST};
use crate::error::ApiError;
use crate::filter::{Filters, QueryString};
use crate::routes::AppState;
use crate::validator::Validator;

use super::ResourceId;

/// Clients may send this to refuse an update if the movie moved on.
pub const EXPECTED_VERSION_HEADER: &str = "x-expected-version";

const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreateMovieInput {
    pub title: String,
    pub year: i32,
    pub runtime: i32,
    pub genres: Vec<String>,
}

/// Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMovieInput {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<i32>,
    pub genres: Option<Vec<String>>,
}

/// POST /v1/movies - create a movie
pub async fn create_movie(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CreateMovieInput>,
) -> ApiResult {
    let mut movie = Movie {
        id: 0,
        created_at: Utc::now(),
        title: input.title,
        year: input.year,
        runtime: input.runtime,
        genres: input.genres,
        version: 1,
    };

    let mut v = Validator::new();
    validate_movie(&mut v, &movie);
    v.finish()?;

    state.models.movies.insert(&mut movie).await?;

    let location = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id))
        .map_err(ApiError::server_error)?;

    Ok(Envelope::new()
        .with("movie", &movie)
        .created()
        .header(header::LOCATION, location))
}

/// GET /v1/movies/:id - show one movie
pub async fn show_movie(State(state): State<AppState>, ResourceId(id): ResourceId) -> ApiResult {
    let movie = state.models.movies.get(id).await?;
    Ok(Envelope::new().with("movie", &movie))
}

/// PATCH /v1/movies/:id - partial update, conditioned on the version read
pub async fn update_movie(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    headers: HeaderMap,
    JsonBody(input): JsonBody<UpdateMovieInput>,
) -> ApiResult {
    let mut movie = state.models.movies.get(id).await?;

    if let Some(expected) = headers.get(EXPECTED_VERSION_HEADER) {
        if expected.as_bytes() != movie.version.to_string().as_bytes() {
            return Err(ApiError::EditConflict);
        }
    }

    if let Some(title) = input.title {
        movie.title = title;
    }
    if let Some(year) = input.year {
        movie.year = year;
    }
    if let Some(runtime) = input.runtime {
        movie.runtime = runtime;
    }
    if let Some(genres) = input.genres {
        movie.genres = genres;
    }

    let mut v = Validator::new();
    validate_movie(&mut v, &movie);
    v.finish()?;

    state.models.movies.update(&mut movie).await?;

    Ok(Envelope::new().with("movie", &movie))
}

/// DELETE /v1/movies/:id - delete a movie
pub async fn delete_movie(State(state): State<AppState>, ResourceId(id): ResourceId) -> ApiResult {
    state.models.movies.delete(id).await?;
    Ok(Envelope::new().with("message", "movie successfully deleted"))
}

/// GET /v1/movies - filtered, sorted, paginated listing
///
/// Query parameters: `title`, `genres` (comma separated), `page`, `page_size`, `sort`.
/// Every bad parameter is reported at once, and nothing is queried unless all pass.
pub async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let qs = QueryString::new(&params);
    let mut v = Validator::new();

    let title = qs.read_string("title", "");
    let genres = qs.read_csv("genres", Vec::new());
    let page = qs.read_int("page", 1, &mut v);
    let page_size = qs.read_int("page_size", DEFAULT_PAGE_SIZE, &mut v);
    let sort = qs.read_string("sort", "id");

    let filters = Filters::new(page, page_size, sort, MOVIE_SORT_SAFELIST);
    filters.validate(&mut v);
    v.finish()?;

    let (movies, metadata) = state.models.movies.get_all(&title, &genres, &filters).await?;

    Ok(Envelope::new()
        .with("movie", &movies)
        .with("metadata", &metadata))
}
