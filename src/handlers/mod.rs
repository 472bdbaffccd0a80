// Route handlers, one module per resource.
pub mod healthcheck;
pub mod movies;
pub mod tokens;
pub mod users;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

use crate::error::ApiError;

/// Positive integer `:id` path segment; anything else is a 404.
pub fn read_id_param(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}

/// The `:id` segment of a resource route. Any segment that fails to decode
/// or parse is a 404, never the router's plain-text 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for ResourceId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(error = %rejection, "undecodable id segment");
                ApiError::NotFound
            })?;
        read_id_param(&raw).map(ResourceId)
    }
}

/// Router fallback for unknown paths.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
