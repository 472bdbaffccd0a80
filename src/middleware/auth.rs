use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::database::models::{validate_token_plaintext, TokenScope, TokenStore, User};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::validator::Validator;

/// Who is making the request. Every request that passed `authenticate`
/// carries exactly one of these in its extensions.
#[derive(Clone, Debug)]
pub enum Identity {
    Anonymous,
    User(Arc<User>),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::User(user) => Some(user),
        }
    }
}

/// Resolves the bearer token, if any, into an `Identity`.
///
/// A missing header is not an error here; rejecting anonymous callers is the
/// job of the gates in `permissions`. A malformed header or an unknown token
/// fails the request immediately.
pub async fn authenticate(
    State(tokens): State<Arc<dyn TokenStore>>,
    mut request: Request,
    next: Next,
) -> Response {
    let response = match resolve_identity(tokens.as_ref(), request.headers()).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };

    vary_on_authorization(response)
}

fn vary_on_authorization(mut response: Response) -> Response {
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// Parses `Authorization: Bearer <token>` and looks the token up under the
/// authentication scope.
pub async fn resolve_identity(
    tokens: &dyn TokenStore,
    headers: &HeaderMap,
) -> Result<Identity, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Identity::Anonymous);
    };

    let token = bearer_token(value).ok_or(ApiError::InvalidAuthenticationHeader)?;

    let mut v = Validator::new();
    validate_token_plaintext(&mut v, token);
    if !v.valid() {
        return Err(ApiError::InvalidAuthenticationToken);
    }

    match tokens.resolve(TokenScope::Authentication, token).await {
        Ok(user) => Ok(Identity::User(Arc::new(user))),
        Err(DatabaseError::NotFound) => Err(ApiError::InvalidAuthenticationToken),
        Err(e) => Err(e.into()),
    }
}

fn bearer_token(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    /// Every route sits under `authenticate`, so a missing identity is a
    /// wiring bug. It is logged against the route and answered with a 500.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Identity>() {
            Some(identity) => Ok(identity.clone()),
            None => {
                tracing::error!(
                    method = %parts.method,
                    path = %parts.uri.path(),
                    "identity extracted on a route not wrapped by authenticate"
                );
                Err(ApiError::server_error(format!(
                    "authenticate did not run for {} {}",
                    parts.method,
                    parts.uri.path()
                )))
            }
        }
    }
}
