use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::database::manager::{Database, DatabaseError};
use crate::database::query_builder::QueryBuilder;
use crate::filter::{Filters, Metadata};
use crate::validator::{unique, Validator};

/// Columns clients may sort movie listings by.
pub const MOVIE_SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

const MOVIE_COLUMNS: &[&str] = &["id", "created_at", "title", "year", "runtime", "genres", "version"];

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Movie {
    pub id: i64,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub year: i32,
    pub runtime: i32,
    pub genres: Vec<String>,
    pub version: i32,
}

pub fn validate_movie(v: &mut Validator, movie: &Movie) {
    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(movie.title.len() <= 500, "title", "must not be more than 500 bytes long");

    v.check(movie.year != 0, "year", "must be provided");
    v.check(movie.year >= 1888, "year", "must be greater than 1888");
    v.check(movie.year <= Utc::now().year(), "year", "must not be in the future");

    v.check(movie.runtime != 0, "runtime", "must be provided");
    v.check(movie.runtime > 0, "runtime", "must be a positive integer");

    v.check(!movie.genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(movie.genres.len() <= 5, "genres", "must not contain more than 5 genres");
    v.check(unique(&movie.genres), "genres", "must not contain duplicate values");
}

#[async_trait]
pub trait MovieStore: Send + Sync {
    /// Persists a new movie, filling in `id`, `created_at` and `version`.
    async fn insert(&self, movie: &mut Movie) -> Result<(), DatabaseError>;

    async fn get(&self, id: i64) -> Result<Movie, DatabaseError>;

    async fn get_all(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata), DatabaseError>;

    /// Writes the movie only if its stored version still equals `movie.version`;
    /// bumps `movie.version` on success, `EditConflict` otherwise.
    async fn update(&self, movie: &mut Movie) -> Result<(), DatabaseError>;

    async fn delete(&self, id: i64) -> Result<(), DatabaseError>;
}

pub struct PgMovieStore {
    db: Database,
}

impl PgMovieStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MovieStore for PgMovieStore {
    async fn insert(&self, movie: &mut Movie) -> Result<(), DatabaseError> {
        let query = r#"
            INSERT INTO movies (title, year, runtime, genres)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at, version
        "#;

        let (id, created_at, version) = self
            .db
            .run(
                sqlx::query_as::<_, (i64, DateTime<Utc>, i32)>(query)
                    .bind(&movie.title)
                    .bind(movie.year)
                    .bind(movie.runtime)
                    .bind(&movie.genres)
                    .fetch_one(self.db.pool()),
            )
            .await?;

        movie.id = id;
        movie.created_at = created_at;
        movie.version = version;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Movie, DatabaseError> {
        if id < 1 {
            return Err(DatabaseError::NotFound);
        }

        let query = r#"
            SELECT id, created_at, title, year, runtime, genres, version
            FROM movies
            WHERE id = $1
        "#;

        self.db
            .run(sqlx::query_as::<_, Movie>(query).bind(id).fetch_one(self.db.pool()))
            .await
    }

    async fn get_all(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata), DatabaseError> {
        let order = filters.sort_order()?;

        let (movies, total) = QueryBuilder::new("movies", MOVIE_COLUMNS)?
            .text_search("title", title)?
            .contains_all("genres", genres)?
            .order(order)
            .paginate(filters)
            .fetch_page::<Movie>(&self.db)
            .await?;

        let metadata = Metadata::calculate(total, filters.page, filters.page_size);
        Ok((movies, metadata))
    }

    async fn update(&self, movie: &mut Movie) -> Result<(), DatabaseError> {
        let query = r#"
            UPDATE movies
            SET title = $1, year = $2, runtime = $3, genres = $4, version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING version
        "#;

        let version = self
            .db
            .run(
                sqlx::query_scalar::<_, i32>(query)
                    .bind(&movie.title)
                    .bind(movie.year)
                    .bind(movie.runtime)
                    .bind(&movie.genres)
                    .bind(movie.id)
                    .bind(movie.version)
                    .fetch_one(self.db.pool()),
            )
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound => DatabaseError::EditConflict,
                other => other,
            })?;

        movie.version = version;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        if id < 1 {
            return Err(DatabaseError::NotFound);
        }

        let result = self
            .db
            .run(
                sqlx::query("DELETE FROM movies WHERE id = $1")
                    .bind(id)
                    .execute(self.db.pool()),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound);
        }
        Ok(())
    }
}
